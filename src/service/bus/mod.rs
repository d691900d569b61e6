//! Publishes aggregated status changes to an external message bus. Wires
//! itself as an observer of the presence engine; reconnection policy is the
//! AMQP client's own responsibility.

use lapin::{
	BasicProperties, Connection, ConnectionProperties,
	options::{BasicPublishOptions, ExchangeDeclareOptions},
	types::FieldTable,
};
use presencer_core::Result;
use tracing::{debug, warn};

use crate::presence::{Status, aggregate_status};

const EXCHANGE: &str = "presence";
const ROUTING_KEY: &str = "status_changes";

pub struct BusPublisher {
	channel: lapin::Channel,
}

impl BusPublisher {
	/// Connects to the AMQP broker at `uri` and declares the `presence`
	/// topic exchange this publisher emits on.
	pub async fn connect(uri: &str) -> Result<Self> {
		let connection = Connection::connect(uri, ConnectionProperties::default())
			.await
			.map_err(|e| presencer_core::Error::storage(e.to_string()))?;
		let channel = connection
			.create_channel()
			.await
			.map_err(|e| presencer_core::Error::storage(e.to_string()))?;

		channel
			.exchange_declare(
				EXCHANGE,
				lapin::ExchangeKind::Topic,
				ExchangeDeclareOptions::default(),
				FieldTable::default(),
			)
			.await
			.map_err(|e| presencer_core::Error::storage(e.to_string()))?;

		Ok(Self { channel })
	}

	/// Observer entry point: call this from the presence engine's `watch`
	/// callback. Failures are logged and otherwise swallowed — a bus outage
	/// must never fail a PUBLISH/SUBSCRIBE transaction.
	pub async fn status_changed(&self, resource: &str, statuses: &[(String, Status)]) {
		let aggregated = aggregate_status(statuses);
		let payload = match serde_json::to_vec(&(resource, aggregated)) {
			| Ok(payload) => payload,
			| Err(e) => {
				warn!(resource, error = %e, "failed to serialize status change for bus");
				return;
			},
		};

		let publish = self
			.channel
			.basic_publish(
				EXCHANGE,
				ROUTING_KEY,
				BasicPublishOptions::default(),
				&payload,
				BasicProperties::default(),
			)
			.await;

		match publish {
			| Ok(confirm) => {
				if let Err(e) = confirm.await {
					warn!(resource, error = %e, "bus publish was not confirmed");
				} else {
					debug!(resource, "published status change to bus");
				}
			},
			| Err(e) => warn!(resource, error = %e, "failed to publish status change to bus"),
		}
	}
}
