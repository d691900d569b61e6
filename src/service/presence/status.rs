use presencer_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One publisher's claim about a resource: a presence document, its
/// absolute expiry (seconds since the Unix epoch), and the priority used to
/// break ties during aggregation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Status {
	pub presence: Value,
	pub expiresat: u64,
	pub priority: i64,
}

impl Status {
	#[must_use]
	pub fn new(presence: Value, expiresat: u64, priority: i64) -> Self {
		Self { presence, expiresat, priority }
	}

	pub fn serialize(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }

	pub fn parse(s: &str) -> Result<Self> { Ok(serde_json::from_str(s)?) }

	#[must_use]
	pub fn is_expired(&self, now: u64) -> bool { self.expiresat < now }

	#[must_use]
	pub fn is_online(&self) -> bool {
		self.presence.get("status").and_then(Value::as_str) == Some("online")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_through_json() {
		let status = Status::new(serde_json::json!({"status": "online"}), 1_700_000_000, 5);
		let text = status.serialize().unwrap();
		assert_eq!(Status::parse(&text).unwrap(), status);
	}

	#[test]
	fn expiry_boundary() {
		let status = Status::new(serde_json::json!({"status": "online"}), 100, 0);
		assert!(!status.is_expired(99));
		assert!(!status.is_expired(100));
		assert!(status.is_expired(101));
	}
}
