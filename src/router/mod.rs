//! Wires the presence engine, watcher registry, and bus publisher into a
//! running server: the glue a transport binary calls into at startup, during
//! its run loop, and at shutdown.

use std::{sync::Arc, time::Duration};

use presencer_core::{Config, Result, clock};
use presencer_database::RedisStorage;
use presencer_service::{
	PresenceEngine, WatcherId, WatcherRegistry,
	bus::BusPublisher,
	presence::run_stats_tally,
};
use presencer_sip::{
	install_notify_observer,
	types::{DialogFactory, NotifyTransport, SubscriptionState},
};
use tokio::sync::Notify;
use tracing::{info, warn};

/// The set of long-lived collaborators a running server holds for its
/// lifetime. Built by [`start`], driven by [`run`], torn down by [`stop`].
pub struct Services {
	pub engine: Arc<PresenceEngine>,
	pub registry: Arc<WatcherRegistry>,
	pub bus: Option<Arc<BusPublisher>>,
	shutdown: Arc<Notify>,
}

impl Services {
	/// Signals [`run`] to return. Idempotent.
	pub fn shutdown(&self) { self.shutdown.notify_waiters(); }
}

/// Connects to storage and the bus, builds the engine and registry, and
/// wires change notifications through to watchers. No SIP transport is
/// started here; that is a collaborator the caller supplies separately.
pub async fn start(config: &Config) -> Result<Services> {
	info!(storage = %config.storage_connection, "connecting to storage");
	let storage = Arc::new(RedisStorage::connect(&config.storage_connection).await?);

	let engine = PresenceEngine::new(storage.clone());
	let registry = WatcherRegistry::new(storage);

	let bus = match BusPublisher::connect(&config.amqp_uri).await {
		| Ok(bus) => {
			let bus = Arc::new(bus);
			let for_callback = Arc::clone(&bus);
			engine.watch(Arc::new(move |resource, statuses| {
				let bus = Arc::clone(&for_callback);
				Box::pin(async move { bus.status_changed(&resource, &statuses).await })
			}));
			Some(bus)
		},
		| Err(e) => {
			warn!(error = %e, "bus publisher unavailable, continuing without change fan-out");
			None
		},
	};

	install_notify_observer(&engine, Arc::clone(&registry), Arc::new(LoggingTransport) as _);

	Ok(Services { engine, registry, bus, shutdown: Arc::new(Notify::new()) })
}

/// Runs the server until [`Services::shutdown`] is called, driving the
/// periodic stats tally alongside whatever transport the caller is running.
pub async fn run(services: &Services) -> Result<()> {
	let tally = tokio::spawn(run_stats_tally(Arc::clone(&services.engine), Duration::from_secs(60)));
	services.shutdown.notified().await;
	tally.abort();
	Ok(())
}

/// Releases the storage and bus connections. Currently a no-op beyond
/// logging: both hold their own connections and are dropped with `Services`.
pub async fn stop(services: &Services) -> Result<()> {
	let _ = services;
	info!("server stopped");
	Ok(())
}

/// Placeholder [`NotifyTransport`]/[`DialogFactory`] that only logs: a real
/// deployment supplies its own SIP-transaction-backed implementation.
struct LoggingTransport;

#[async_trait::async_trait]
impl NotifyTransport for LoggingTransport {
	async fn send_notify(
		&self,
		watcher: &WatcherId,
		pidf: &str,
		state: SubscriptionState,
		expires_secs: u64,
	) -> Result<()> {
		info!(%watcher, state = state.as_str(), expires_secs, body_len = pidf.len(), "notify");
		Ok(())
	}
}

#[async_trait::async_trait]
impl DialogFactory for LoggingTransport {
	async fn create_dialog(&self, resource: &str) -> Result<WatcherId> {
		WatcherId::new("dialog", &clock::now().to_string(), resource)
	}

	async fn remove_dialog(&self, watcher: &WatcherId) -> Result<()> {
		info!(%watcher, "dialog removed");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn shutdown_unblocks_run() {
		let services = Services {
			engine: PresenceEngine::new(Arc::new(presencer_database::MemoryStorage::new())),
			registry: WatcherRegistry::new(Arc::new(presencer_database::MemoryStorage::new())),
			bus: None,
			shutdown: Arc::new(Notify::new()),
		};

		let shutdown = Arc::clone(&services.shutdown);
		let handle = tokio::spawn(async move {
			shutdown.notified().await;
		});
		services.shutdown();
		handle.await.unwrap();
	}
}
