//! PIDF (`application/pidf+xml`) document construction and the minimal
//! parsing the presence server actually needs: detecting whether a
//! publisher's body claims an `open` (online) or `closed` (offline) basic
//! status.

use std::sync::LazyLock;

use presencer_service::{Status, aggregate_status};
use regex::Regex;
use serde_json::Value;

static ONLINE_PATTERN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r".*<status><basic>open</basic></status>.*").unwrap());

/// Strips all whitespace from `body` and matches it against the basic-status
/// pattern, returning the presence document a PUBLISH body encodes.
#[must_use]
pub fn parse_publish_body(body: &str) -> Value {
	let stripped: String = body.chars().filter(|c| !c.is_whitespace()).collect();
	if ONLINE_PATTERN.is_match(&stripped) {
		serde_json::json!({"status": "online"})
	} else {
		serde_json::json!({"status": "offline"})
	}
}

fn basic_status(presence: &Value) -> &'static str {
	match presence.get("status").and_then(Value::as_str) {
		| Some("online") => "open",
		| _ => "closed",
	}
}

/// Builds the PIDF document reflecting `resource`'s current aggregated
/// status, for use as a NOTIFY body.
#[must_use]
pub fn build_pidf(resource: &str, statuses: &[(String, Status)]) -> String {
	let aggregated = aggregate_status(statuses);
	let status = aggregated
		.get("presence")
		.map_or_else(|| "offline".into(), |p| basic_status(p).to_owned());

	format!(
		"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
		 <presence xmlns=\"urn:ietf:params:xml:ns:pidf\" entity=\"pres:{resource}\">\n\
		 \t<tuple id=\"{resource}\">\n\
		 \t\t<status>\n\
		 \t\t\t<basic>{status}</basic>\n\
		 \t\t</status>\n\
		 \t\t<contact>sip:{resource}</contact>\n\
		 \t</tuple>\n\
		 </presence>"
	)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn recognizes_online_regardless_of_whitespace() {
		let body = "<status>\n  <basic>open</basic>\n</status>";
		assert_eq!(parse_publish_body(body), json!({"status": "online"}));
	}

	#[test]
	fn anything_else_is_offline() {
		assert_eq!(parse_publish_body("<status><basic>closed</basic></status>"), json!({"status": "offline"}));
		assert_eq!(parse_publish_body(""), json!({"status": "offline"}));
	}

	#[test]
	fn pidf_reflects_aggregated_status() {
		let statuses = vec![("t1".to_owned(), Status::new(json!({"status": "online"}), u64::MAX, 0))];
		let pidf = build_pidf("a@x", &statuses);
		assert!(pidf.contains("entity=\"pres:a@x\""));
		assert!(pidf.contains("<basic>open</basic>"));
		assert!(pidf.contains("<contact>sip:a@x</contact>"));
	}

	#[test]
	fn pidf_for_empty_resource_is_closed() {
		let pidf = build_pidf("a@x", &[]);
		assert!(pidf.contains("<basic>closed</basic>"));
	}
}
