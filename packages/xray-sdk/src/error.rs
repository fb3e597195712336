pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Config(#[from] xray_config::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error("Invalid candidate counts: {message}")]
	InvalidCounts { message: String },
}
