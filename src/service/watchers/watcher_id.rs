use std::fmt;

use presencer_core::{Error, Result};

/// An opaque SIP dialog identifier, stored as the three-part tuple the
/// transport layer uses to name a dialog. Stringified as `a:b:c`; the
/// separator is rejected inside any part so the round trip through storage
/// is lossless.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WatcherId(String, String, String);

impl WatcherId {
	pub fn new(a: impl Into<String>, b: impl Into<String>, c: impl Into<String>) -> Result<Self> {
		let (a, b, c) = (a.into(), b.into(), c.into());
		if [&a, &b, &c].into_iter().any(|part| part.contains(':')) {
			return Err(Error::BadRequest("watcher identifier part must not contain ':'"));
		}
		Ok(Self(a, b, c))
	}

	/// Parses the `a:b:c` storage-key representation back into a
	/// `WatcherId`.
	pub fn parse(s: &str) -> Result<Self> {
		let mut parts = s.splitn(3, ':');
		match (parts.next(), parts.next(), parts.next()) {
			| (Some(a), Some(b), Some(c)) => Ok(Self(a.to_owned(), b.to_owned(), c.to_owned())),
			| _ => Err(Error::BadRequest("malformed watcher identifier")),
		}
	}

	#[must_use]
	pub fn to_key(&self) -> String { format!("{}:{}:{}", self.0, self.1, self.2) }
}

impl fmt::Display for WatcherId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.to_key()) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_through_key() {
		let id = WatcherId::new("call-1", "from-tag", "to-tag").unwrap();
		assert_eq!(WatcherId::parse(&id.to_key()).unwrap(), id);
	}

	#[test]
	fn rejects_separator_inside_a_part() {
		assert!(WatcherId::new("call:1", "a", "b").is_err());
	}

	#[test]
	fn parse_keeps_colons_within_the_final_part() {
		let id = WatcherId::parse("call-1:from-tag:to-tag:extra").unwrap();
		assert_eq!(id.to_key(), "call-1:from-tag:to-tag:extra");
	}
}
