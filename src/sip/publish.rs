use presencer_core::{Config, Error};
use presencer_service::PresenceEngine;

use crate::{
	pidf::parse_publish_body,
	types::{PublishRequest, SipResponse},
};

const EVENT: &str = "presence";
const CONTENT_TYPE: &str = "application/pidf+xml";

/// Handles a PUBLISH request against the presence engine, implementing the
/// `Expires`/`SIP-If-Match` dispatch described for the presence event
/// package.
pub async fn handle_publish(
	engine: &PresenceEngine,
	config: &Config,
	request: PublishRequest,
) -> SipResponse {
	if request.event.as_deref() != Some(EVENT) {
		return SipResponse::new(489, "Bad Event").with_header("Allow-Event", EVENT);
	}

	if request.body.is_some() && request.content_type.as_deref() != Some(CONTENT_TYPE) {
		return SipResponse::new(415, "Unsupported Media Type").with_header("Accept", CONTENT_TYPE);
	}

	let expires = request.expires.unwrap_or(config.default_publish_expires);
	if expires != 0 && expires < config.min_publish_expires {
		return SipResponse::new(423, "Interval Too Brief");
	}

	let dispatch = dispatch(engine, &request, expires).await;

	let tag = match dispatch {
		| Ok(tag) => tag,
		| Err(Error::NotFound) => return SipResponse::new(412, "Conditional Request Failed"),
		| Err(_) => return SipResponse::new(500, "Server Internal Error"),
	};

	SipResponse::new(200, "OK")
		.with_header("SIP-ETag", tag)
		.with_header("Expires", expires.to_string())
}

async fn dispatch(
	engine: &PresenceEngine,
	request: &PublishRequest,
	expires: u64,
) -> presencer_core::Result<String> {
	match (&request.if_match, expires) {
		| (Some(tag), 0) => {
			engine.remove_status(&request.resource, tag).await?;
			Ok(tag.clone())
		},
		// No conditional tag to remove against: the source's behavior here
		// (removeStatus with no tag) is ambiguous; reject instead.
		| (None, 0) => Err(Error::NotFound),
		| (Some(tag), _) => {
			engine.update_status(&request.resource, tag, expires).await?;
			Ok(tag.clone())
		},
		| (None, _) => {
			let presence = request
				.body
				.as_deref()
				.map_or_else(|| serde_json::json!({"status": "offline"}), parse_publish_body);
			engine
				.put_status(&request.resource, presence, expires, 0, None)
				.await
		},
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use presencer_database::MemoryStorage;

	use super::*;

	fn engine() -> Arc<PresenceEngine> { PresenceEngine::new(Arc::new(MemoryStorage::new())) }

	fn request() -> PublishRequest {
		PublishRequest {
			resource: "a@x".to_owned(),
			event: Some("presence".to_owned()),
			content_type: Some("application/pidf+xml".to_owned()),
			expires: Some(120),
			if_match: None,
			body: Some("<status><basic>open</basic></status>".to_owned()),
		}
	}

	#[tokio::test]
	async fn initial_publish_mints_a_tag() {
		let engine = engine();
		let config = Config::default();
		let response = handle_publish(&engine, &config, request()).await;
		assert_eq!(response.status, 200);
		assert!(response.headers.iter().any(|(k, _)| k == "SIP-ETag"));
	}

	#[tokio::test]
	async fn bad_event_is_rejected() {
		let engine = engine();
		let config = Config::default();
		let mut req = request();
		req.event = Some("dialog".to_owned());
		let response = handle_publish(&engine, &config, req).await;
		assert_eq!(response.status, 489);
	}

	#[tokio::test]
	async fn interval_too_brief_is_rejected() {
		let engine = engine();
		let config = Config::default();
		let mut req = request();
		req.expires = Some(5);
		let response = handle_publish(&engine, &config, req).await;
		assert_eq!(response.status, 423);
	}

	#[tokio::test]
	async fn refresh_with_unknown_tag_is_conditional_failure() {
		let engine = engine();
		let config = Config::default();
		let mut req = request();
		req.if_match = Some("unknown-tag".to_owned());
		let response = handle_publish(&engine, &config, req).await;
		assert_eq!(response.status, 412);
	}

	#[tokio::test]
	async fn remove_without_if_match_is_conditional_failure() {
		let engine = engine();
		let config = Config::default();
		let mut req = request();
		req.expires = Some(0);
		req.if_match = None;
		let response = handle_publish(&engine, &config, req).await;
		assert_eq!(response.status, 412);
	}

	#[tokio::test]
	async fn full_lifecycle_publish_refresh_remove() {
		let engine = engine();
		let config = Config::default();

		let created = handle_publish(&engine, &config, request()).await;
		assert_eq!(created.status, 200);
		let tag = created
			.headers
			.iter()
			.find(|(k, _)| k == "SIP-ETag")
			.map(|(_, v)| v.clone())
			.unwrap();

		let mut remove_req = request();
		remove_req.expires = Some(0);
		remove_req.if_match = Some(tag);
		let removed = handle_publish(&engine, &config, remove_req).await;
		assert_eq!(removed.status, 200);

		let dump = engine.dump_statuses().await.unwrap();
		assert!(!dump.contains_key("a@x"));
	}
}
