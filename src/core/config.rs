use std::path::Path;

use figment::{
	Figment,
	providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Runtime configuration, loaded from an optional TOML file layered under
/// environment overrides (`PRESENCER_*`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Expiry applied to a PUBLISH that omits the `Expires` header.
	pub default_publish_expires: u64,

	/// Minimum accepted PUBLISH `Expires`; shorter intervals are rejected
	/// with 423 (Interval Too Brief).
	pub min_publish_expires: u64,

	/// Backing store connection string, e.g. `redis://127.0.0.1/`.
	pub storage_connection: String,

	/// AMQP broker URI used by the bus publisher.
	pub amqp_uri: String,

	/// Virtual host used when connecting to the AMQP broker.
	pub amqp_vhost: String,

	/// Retained for compatibility with the original bus driver's
	/// configuration surface; the `lapin`-based client does not consume a
	/// protocol spec file.
	pub amqp_spec_path: Option<String>,

	/// `tracing_subscriber::EnvFilter` directive string.
	pub log: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			default_publish_expires: 3600,
			min_publish_expires: 60,
			storage_connection: "redis://127.0.0.1/".to_owned(),
			amqp_uri: "amqp://127.0.0.1/%2f".to_owned(),
			amqp_vhost: "/".to_owned(),
			amqp_spec_path: None,
			log: "info".to_owned(),
		}
	}
}

impl Config {
	/// Loads configuration from an optional TOML file at `path`, layered
	/// under defaults and over-layered by `PRESENCER_`-prefixed environment
	/// variables.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let mut figment = Figment::from(Serialized::defaults(Self::default()));

		if let Some(path) = path {
			figment = figment.merge(Toml::file(path));
		}

		figment = figment.merge(Env::prefixed("PRESENCER_"));

		figment
			.extract()
			.map_err(|e| crate::Error::config(e.to_string()))
	}
}
