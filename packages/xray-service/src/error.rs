#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	pub(crate) fn corrupt(message: impl Into<String>) -> Self {
		Self::Storage { message: message.into() }
	}
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<xray_storage::Error> for Error {
	fn from(err: xray_storage::Error) -> Self {
		match err {
			xray_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			xray_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
		}
	}
}
