mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, DEFAULT_ENDPOINT, DEFAULT_KEEP_ALL_OUTPUTS, DEFAULT_KEEP_THRESHOLD_CANDIDATES,
	DEFAULT_MAX_PAGE_LIMIT, DEFAULT_PAGE_LIMIT, DEFAULT_SAMPLE_RATE, DEFAULT_TIMEOUT_MS, Postgres,
	Query, Sampling, Service, Storage, Tracer,
};

use std::{fs, path::Path};

use serde::de::DeserializeOwned;

pub fn load(path: &Path) -> Result<Config> {
	let mut cfg: Config = read_toml(path)?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

/// Loads client-side tracer settings from a standalone toml file.
pub fn load_tracer(path: &Path) -> Result<Tracer> {
	let mut cfg: Tracer = read_toml(path)?;

	cfg.endpoint = cfg.endpoint.trim().trim_end_matches('/').to_string();

	validate_tracer(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.query.max_page_limit == 0 {
		return Err(Error::Validation {
			message: "query.max_page_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.query.default_page_limit == 0 {
		return Err(Error::Validation {
			message: "query.default_page_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.query.default_page_limit > cfg.query.max_page_limit {
		return Err(Error::Validation {
			message: "query.default_page_limit must not exceed query.max_page_limit.".to_string(),
		});
	}

	Ok(())
}

pub fn validate_tracer(cfg: &Tracer) -> Result<()> {
	if cfg.endpoint.trim().is_empty() {
		return Err(Error::Validation { message: "tracer.endpoint must be non-empty.".to_string() });
	}
	if cfg.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "tracer.timeout_ms must be greater than zero.".to_string(),
		});
	}

	validate_sampling(&cfg.sampling)
}

pub fn validate_sampling(cfg: &Sampling) -> Result<()> {
	if !cfg.sample_rate.is_finite() {
		return Err(Error::Validation {
			message: "sampling.sample_rate must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.sample_rate) {
		return Err(Error::Validation {
			message: "sampling.sample_rate must be in the range 0.0-1.0.".to_string(),
		});
	}

	Ok(())
}

fn read_toml<T>(path: &Path) -> Result<T>
where
	T: DeserializeOwned,
{
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	toml::from_str(&raw).map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();

	if cfg.service.log_level.is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
