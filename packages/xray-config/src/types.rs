use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const DEFAULT_MAX_PAGE_LIMIT: u32 = 100;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_KEEP_ALL_OUTPUTS: bool = true;
pub const DEFAULT_SAMPLE_RATE: f64 = 0.01;
pub const DEFAULT_KEEP_THRESHOLD_CANDIDATES: u32 = 0;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub query: Query,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Query {
	#[serde(default = "default_page_limit")]
	pub default_page_limit: u32,
	#[serde(default = "default_max_page_limit")]
	pub max_page_limit: u32,
}
impl Default for Query {
	fn default() -> Self {
		Self { default_page_limit: DEFAULT_PAGE_LIMIT, max_page_limit: DEFAULT_MAX_PAGE_LIMIT }
	}
}

/// Client-side settings for an instrumented pipeline.
///
/// Every field is populated; absent toml keys fall back to the `DEFAULT_*` constants.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Tracer {
	/// Base URL of the ingestion API. Runs are posted to `{endpoint}/runs`.
	#[serde(default = "default_endpoint")]
	pub endpoint: String,
	/// Upper bound for a single delivery attempt.
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub sampling: Sampling,
}
impl Default for Tracer {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_ENDPOINT.to_string(),
			timeout_ms: DEFAULT_TIMEOUT_MS,
			sampling: Sampling::default(),
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Sampling {
	/// Keep every accepted candidate instead of treating them like any other disposition.
	#[serde(default = "default_keep_all_outputs")]
	pub keep_all_outputs: bool,
	/// Fraction of rejected candidates kept, as a positional prefix. Must be within 0.0-1.0.
	#[serde(default = "default_sample_rate")]
	pub sample_rate: f64,
	/// Extra rejected candidates kept beyond the prefix, chosen by highest score. Zero disables.
	#[serde(default = "default_keep_threshold_candidates")]
	pub keep_threshold_candidates: u32,
}
impl Default for Sampling {
	fn default() -> Self {
		Self {
			keep_all_outputs: DEFAULT_KEEP_ALL_OUTPUTS,
			sample_rate: DEFAULT_SAMPLE_RATE,
			keep_threshold_candidates: DEFAULT_KEEP_THRESHOLD_CANDIDATES,
		}
	}
}

fn default_page_limit() -> u32 {
	DEFAULT_PAGE_LIMIT
}

fn default_max_page_limit() -> u32 {
	DEFAULT_MAX_PAGE_LIMIT
}

fn default_endpoint() -> String {
	DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_ms() -> u64 {
	DEFAULT_TIMEOUT_MS
}

fn default_keep_all_outputs() -> bool {
	DEFAULT_KEEP_ALL_OUTPUTS
}

fn default_sample_rate() -> f64 {
	DEFAULT_SAMPLE_RATE
}

fn default_keep_threshold_candidates() -> u32 {
	DEFAULT_KEEP_THRESHOLD_CANDIDATES
}
