mod aggregate;
mod status;

use std::{
	collections::HashMap,
	sync::{
		Arc, Weak,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use presencer_core::{Error, Result, clock};
use presencer_database::{Storage, keys};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

pub use self::{aggregate::aggregate_status, status::Status};

/// Invoked after every successful state-changing operation on a resource,
/// including transitions to an empty (fully-offline) status list.
pub type ChangeCallback = Arc<dyn Fn(String, Vec<(String, Status)>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct Stats {
	put: AtomicU64,
	updated: AtomicU64,
	gotten: AtomicU64,
	removed: AtomicU64,
	dumped: AtomicU64,
	active_timers: AtomicU64,
}

/// The presence aggregation engine: a multi-tag status store per resource,
/// with lazy and timer-driven expiry and an observer fan-out used by the
/// watcher registry and the bus publisher.
pub struct PresenceEngine {
	self_weak: Weak<Self>,
	storage: Arc<dyn Storage>,
	status_timers: Mutex<HashMap<(String, String), clock::TimerHandle>>,
	callbacks: Mutex<Vec<ChangeCallback>>,
	stats: Stats,
}

impl PresenceEngine {
	/// Builds the engine and registers its crash-recovery routine with the
	/// storage backend's reconnect hook.
	#[must_use]
	pub fn new(storage: Arc<dyn Storage>) -> Arc<Self> {
		let engine = Arc::new_cyclic(|weak| Self {
			self_weak: weak.clone(),
			storage,
			status_timers: Mutex::new(HashMap::new()),
			callbacks: Mutex::new(Vec::new()),
			stats: Stats::default(),
		});

		let weak = engine.self_weak.clone();
		engine.storage.on_reconnect(Arc::new(move || {
			let weak = weak.clone();
			Box::pin(async move {
				if let Some(engine) = weak.upgrade() {
					engine.load_status_timers().await;
				}
			})
		}));

		engine
	}

	/// Registers an observer invoked after every successful state change.
	pub fn watch(&self, callback: ChangeCallback) { self.callbacks.lock().push(callback); }

	pub async fn put_status(
		&self,
		resource: &str,
		presence: Value,
		expires_secs: u64,
		priority: i64,
		tag: Option<String>,
	) -> Result<String> {
		let tag = tag.unwrap_or_else(presencer_core::utils::rand::tag);
		let expiresat = clock::now().saturating_add(expires_secs);
		let status = Status::new(presence.clone(), expiresat, priority);

		let table = keys::resource_table(resource);
		let rset = keys::resources_set();

		let serialized = status.serialize()?;
		let hset = self.storage.hset(&table, &tag, &serialized);
		let sadd = self.storage.sadd(rset, resource);
		let notify = self.notify_watchers(resource);
		let (hset, sadd, _) = tokio::join!(hset, sadd, notify);
		hset?;
		sadd?;

		self.set_status_timer(resource, &tag, expires_secs);
		self.stats.put.fetch_add(1, Ordering::Relaxed);
		debug!(resource, tag, expires_secs, priority, ?presence, "put status");

		Ok(tag)
	}

	pub async fn update_status(&self, resource: &str, tag: &str, expires_secs: u64) -> Result<()> {
		let current = self.get_status(resource, Some(tag)).await?;
		let Some((_, mut status)) = current.into_iter().next() else {
			return Err(Error::NotFound);
		};

		status.expiresat = clock::now().saturating_add(expires_secs);
		let table = keys::resource_table(resource);
		self.storage.hset(&table, tag, &status.serialize()?).await?;
		self.notify_watchers(resource).await;
		self.set_status_timer(resource, tag, expires_secs);
		self.stats.updated.fetch_add(1, Ordering::Relaxed);
		debug!(resource, tag, expires_secs, "update status");

		Ok(())
	}

	pub fn get_status<'a>(
		&'a self,
		resource: &'a str,
		tag: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<(String, Status)>>> {
		Box::pin(async move {
			self.stats.gotten.fetch_add(1, Ordering::Relaxed);
			let table = keys::resource_table(resource);

			let raw: Vec<(String, String)> = if let Some(tag) = tag {
				match self.storage.hget(&table, tag).await? {
					| Some(value) => vec![(tag.to_owned(), value)],
					| None => Vec::new(),
				}
			} else {
				self.storage.hgetall(&table).await?.into_iter().collect()
			};

			let mut statuses = Vec::with_capacity(raw.len());
			for (tag, value) in raw {
				statuses.push((tag, Status::parse(&value)?));
			}

			let now = clock::now();
			let (active, expired): (Vec<_>, Vec<_>) =
				statuses.into_iter().partition(|(_, s)| !s.is_expired(now));

			if !expired.is_empty() {
				debug!(resource, expired = expired.len(), "expired statuses found on read");
				for (tag, _) in expired {
					let resource = resource.to_owned();
					if let Some(engine) = self.self_weak.upgrade() {
						let fut: BoxFuture<'static, ()> = Box::pin(async move {
							engine.remove_status(&resource, &tag).await.ok();
						});
						tokio::spawn(fut);
					}
				}
			}

			trace!(resource, ?tag, count = active.len(), "get status");
			Ok(active)
		})
	}

	pub async fn dump_statuses(&self) -> Result<HashMap<String, Vec<(String, Status)>>> {
		let resources = self.storage.sgetall(keys::resources_set()).await?;
		let mut result = HashMap::with_capacity(resources.len());
		trace!("dump all statuses");
		for resource in resources {
			let statuses = self.get_status(&resource, None).await?;
			result.insert(resource, statuses);
		}
		self.stats.dumped.fetch_add(1, Ordering::Relaxed);
		Ok(result)
	}

	pub async fn remove_status(&self, resource: &str, tag: &str) -> Result<()> {
		self.stats.removed.fetch_add(1, Ordering::Relaxed);
		let table = keys::resource_table(resource);

		self.storage.hdel(&table, tag).await?;
		let remaining = self.storage.hgetall(&table).await?;
		if remaining.is_empty() {
			self.storage.srem(keys::resources_set(), resource).await?;
		}

		// Cancel unconditionally: a timer firing concurrently with an explicit
		// removal must not leave a dangling entry in `status_timers`.
		let existed = self.cancel_status_timer(resource, tag);
		if !existed {
			debug!(resource, tag, "remove status >> not found");
			return Err(Error::NotFound);
		}

		self.notify_watchers(resource).await;
		debug!(resource, tag, "remove status >> removed");
		Ok(())
	}

	fn set_status_timer(&self, resource: &str, tag: &str, delay_secs: u64) {
		let key = (resource.to_owned(), tag.to_owned());
		let mut timers = self.status_timers.lock();
		if let Some(handle) = timers.get(&key) {
			handle.reset(Duration::from_secs(delay_secs));
		} else {
			let weak = self.self_weak.clone();
			let (resource, tag) = key.clone();
			let handle = clock::schedule(
				Duration::from_secs(delay_secs),
				Arc::new(move || {
					let weak = weak.clone();
					let resource = resource.clone();
					let tag = tag.clone();
					Box::pin(async move {
						if let Some(engine) = weak.upgrade() {
							if let Err(e) = engine.remove_status(&resource, &tag).await {
								if !matches!(e, Error::NotFound) {
									warn!(%resource, %tag, error = %e, "expiry removal failed");
								}
							}
						}
					})
				}),
			);
			self.stats.active_timers.fetch_add(1, Ordering::Relaxed);
			timers.insert(key.clone(), handle);
		}
		drop(timers);

		self.store_status_timer(resource, tag, delay_secs);
		trace!(resource, tag, delay_secs, "set timer");
	}

	/// Cancels and drops the in-memory and persisted timer for `(resource,
	/// tag)`. Returns whether a timer was actually present.
	fn cancel_status_timer(&self, resource: &str, tag: &str) -> bool {
		let key = (resource.to_owned(), tag.to_owned());
		let handle = self.status_timers.lock().remove(&key);
		match handle {
			| Some(handle) => {
				self.stats.active_timers.fetch_sub(1, Ordering::Relaxed);
				handle.cancel();
				self.drop_status_timer(resource, tag);
				trace!(resource, tag, "cancel timer >> removed");
				true
			},
			| None => {
				trace!(resource, tag, "cancel timer >> not found");
				false
			},
		}
	}

	fn store_status_timer(&self, resource: &str, tag: &str, delay_secs: u64) {
		let field = keys::timer_field(resource, tag);
		let expiresat = clock::now().saturating_add(delay_secs);
		let storage = Arc::clone(&self.storage);
		tokio::spawn(async move {
			if let Err(e) = storage
				.hset(keys::timers_table(), &field, &expiresat.to_string())
				.await
			{
				warn!(error = %e, "failed to persist status timer");
			}
		});
	}

	fn drop_status_timer(&self, resource: &str, tag: &str) {
		let field = keys::timer_field(resource, tag);
		let storage = Arc::clone(&self.storage);
		tokio::spawn(async move {
			storage.hdel(keys::timers_table(), &field).await.ok();
		});
	}

	/// Crash recovery: reloads persisted timer entries after a storage
	/// reconnect. Already-expired entries are dropped from storage; the rest
	/// get a fresh in-memory timer for their remaining lifetime. The
	/// persisted expiry itself is left untouched during the load.
	async fn load_status_timers(&self) {
		let timers = match self.storage.hgetall(keys::timers_table()).await {
			| Ok(timers) => timers,
			| Err(e) => {
				warn!(error = %e, "failed to load status timers");
				return;
			},
		};

		let now = clock::now();
		for (key, expiresat) in timers {
			let Some((resource, tag)) = key.split_once(':') else {
				warn!(key, "malformed status timer key");
				continue;
			};
			let Ok(expiresat) = expiresat.parse::<u64>() else {
				warn!(key, expiresat, "malformed status timer expiry");
				continue;
			};

			if expiresat < now {
				// Corrected: drop under the timer's own (resource, tag), not the
				// engine's own identity.
				self.drop_status_timer(resource, tag);
				trace!(resource, tag, expiresat, "load timers >> status expired");
			} else {
				let delay = expiresat - now;
				self.set_status_timer(resource, tag, delay);
				trace!(resource, tag, expiresat, "load timers >> set timer");
			}
		}
	}

	async fn notify_watchers(&self, resource: &str) {
		let status = match self.get_status(resource, None).await {
			| Ok(status) => status,
			| Err(e) => {
				warn!(resource, error = %e, "failed to read status for notification");
				return;
			},
		};

		let callbacks = self.callbacks.lock().clone();
		for callback in callbacks {
			callback(resource.to_owned(), status.clone()).await;
		}
	}
}

/// Periodically logs aggregate counters, mirroring the source's tally of
/// active timers and throughput.
pub async fn run_stats_tally(engine: Arc<PresenceEngine>, period: Duration) {
	let mut ticker = tokio::time::interval(period);
	ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
	loop {
		ticker.tick().await;
		info!(
			active_timers = engine.stats.active_timers.load(Ordering::Relaxed),
			put = engine.stats.put.swap(0, Ordering::Relaxed),
			updated = engine.stats.updated.swap(0, Ordering::Relaxed),
			gotten = engine.stats.gotten.swap(0, Ordering::Relaxed),
			removed = engine.stats.removed.swap(0, Ordering::Relaxed),
			dumped = engine.stats.dumped.swap(0, Ordering::Relaxed),
			"presence engine stats"
		);
	}
}

#[cfg(test)]
mod tests {
	use presencer_database::MemoryStorage;
	use serde_json::json;

	use super::*;

	fn engine() -> Arc<PresenceEngine> { PresenceEngine::new(Arc::new(MemoryStorage::new())) }

	#[tokio::test]
	async fn put_then_get_returns_active_status() {
		let engine = engine();
		let tag = engine
			.put_status("a@x", json!({"status": "online"}), 100, 0, None)
			.await
			.unwrap();

		let statuses = engine.get_status("a@x", None).await.unwrap();
		assert_eq!(statuses.len(), 1);
		assert_eq!(statuses[0].0, tag);
	}

	#[tokio::test]
	async fn update_missing_tag_is_not_found() {
		let engine = engine();
		let result = engine.update_status("a@x", "nope", 100).await;
		assert!(matches!(result, Err(Error::NotFound)));
	}

	#[tokio::test]
	async fn remove_missing_tag_is_not_found() {
		let engine = engine();
		let result = engine.remove_status("a@x", "nope").await;
		assert!(matches!(result, Err(Error::NotFound)));
	}

	#[tokio::test]
	async fn remove_is_idempotent_under_double_invocation() {
		let engine = engine();
		let tag = engine
			.put_status("a@x", json!({"status": "online"}), 100, 0, None)
			.await
			.unwrap();

		engine.remove_status("a@x", &tag).await.unwrap();
		let second = engine.remove_status("a@x", &tag).await;
		assert!(matches!(second, Err(Error::NotFound)));
	}

	#[tokio::test]
	async fn resource_drops_out_of_index_when_last_status_removed() {
		let engine = engine();
		let tag = engine
			.put_status("a@x", json!({"status": "online"}), 100, 0, None)
			.await
			.unwrap();
		engine.remove_status("a@x", &tag).await.unwrap();

		let dump = engine.dump_statuses().await.unwrap();
		assert!(!dump.contains_key("a@x"));
	}

	#[tokio::test]
	async fn observer_sees_every_change_including_transition_to_empty() {
		let engine = engine();
		let seen = Arc::new(Mutex::new(Vec::new()));
		let seen2 = Arc::clone(&seen);
		engine.watch(Arc::new(move |resource, statuses| {
			let seen = Arc::clone(&seen2);
			Box::pin(async move {
				seen.lock().push((resource, statuses.len()));
			})
		}));

		let tag = engine
			.put_status("a@x", json!({"status": "online"}), 100, 0, None)
			.await
			.unwrap();
		engine.remove_status("a@x", &tag).await.unwrap();

		let log = seen.lock().clone();
		assert_eq!(log, vec![("a@x".to_owned(), 1), ("a@x".to_owned(), 0)]);
	}
}
