use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
	#[error("not found")]
	NotFound,

	#[error("bad request: {0}")]
	BadRequest(&'static str),

	#[error("storage backend unavailable: {0}")]
	Storage(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("internal error: {0}")]
	Internal(String),

	#[error("serialization error: {0}")]
	Serialize(#[from] serde_json::Error),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	#[must_use]
	pub fn internal(msg: impl Into<String>) -> Self { Self::Internal(msg.into()) }

	#[must_use]
	pub fn storage(msg: impl Into<String>) -> Self { Self::Storage(msg.into()) }

	#[must_use]
	pub fn config(msg: impl Into<String>) -> Self { Self::Config(msg.into()) }

	/// True for errors that mean "the thing you asked about does not exist",
	/// as opposed to a transport or validation failure.
	#[must_use]
	pub const fn is_not_found(&self) -> bool { matches!(self, Self::NotFound) }
}

/// Build an [`Error::Internal`] with a formatted message, mirroring the
/// `err!`-style helper macros used elsewhere in the workspace.
#[macro_export]
macro_rules! err {
	($($arg:tt)*) => {
		$crate::Error::internal(format!($($arg)*))
	};
}
