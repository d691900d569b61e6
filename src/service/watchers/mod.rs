//! The watcher registry: tracks which SIP dialogs are subscribed to which
//! resources, with the same persisted-timer/crash-recovery discipline as the
//! presence engine's status timers. NOTIFY construction and dispatch are a
//! transport-layer concern and live above this registry.

mod watcher_id;

use std::{
	collections::HashMap,
	sync::{Arc, Weak},
	time::Duration,
};

use parking_lot::Mutex;
use presencer_core::{Error, Result, clock};
use presencer_database::{Storage, keys};
use tracing::{trace, warn};

pub use self::watcher_id::WatcherId;

pub struct WatcherRegistry {
	self_weak: Weak<Self>,
	storage: Arc<dyn Storage>,
	timers: Mutex<HashMap<WatcherId, clock::TimerHandle>>,
}

impl WatcherRegistry {
	#[must_use]
	pub fn new(storage: Arc<dyn Storage>) -> Arc<Self> {
		let registry = Arc::new_cyclic(|weak| Self {
			self_weak: weak.clone(),
			storage,
			timers: Mutex::new(HashMap::new()),
		});

		let weak = registry.self_weak.clone();
		registry.storage.on_reconnect(Arc::new(move || {
			let weak = weak.clone();
			Box::pin(async move {
				if let Some(registry) = weak.upgrade() {
					registry.load_watcher_timers().await;
				}
			})
		}));

		registry
	}

	/// Registers a new subscription: adds the watcher to the
	/// resource's watcher set and schedules its expiry timer. The caller is
	/// responsible for sending the initial NOTIFY.
	pub async fn add_watcher(&self, watcher: &WatcherId, resource: &str, expires_secs: u64) -> Result<()> {
		self.storage
			.sadd(&keys::watchers_by_resource(resource), &watcher.to_key())
			.await?;
		self.storage
			.hset(keys::resource_by_watcher(), &watcher.to_key(), resource)
			.await?;
		self.set_watcher_timer(watcher, expires_secs);
		trace!(watcher = %watcher, resource, expires_secs, "add watcher");
		Ok(())
	}

	/// Refreshes an existing subscription's expiry. Returns
	/// [`Error::Internal`] if the watcher was never added — the source
	/// treats this as a server bug (SIP 500), not a client error.
	pub fn update_watcher(&self, watcher: &WatcherId, expires_secs: u64) -> Result<()> {
		if !self.timers.lock().contains_key(watcher) {
			return Err(Error::internal(format!("unknown watcher {watcher}")));
		}
		self.set_watcher_timer(watcher, expires_secs);
		trace!(watcher = %watcher, expires_secs, "update watcher");
		Ok(())
	}

	/// Tears down a subscription: cancels its timer, removes it from the
	/// resource's watcher set, and drops the resource-by-watcher mapping.
	/// Returns [`Error::NotFound`] if the watcher was already gone.
	pub async fn remove_watcher(&self, watcher: &WatcherId) -> Result<()> {
		if self.timers.lock().remove(watcher).is_none() {
			return Err(Error::NotFound);
		}

		let resource = self.resource_for(watcher).await?;
		self.storage
			.srem(&keys::watchers_by_resource(&resource), &watcher.to_key())
			.await?;
		self.storage
			.hdel(keys::resource_by_watcher(), &watcher.to_key())
			.await?;
		self.drop_watcher_timer(watcher);
		trace!(watcher = %watcher, "remove watcher");
		Ok(())
	}

	pub async fn resource_for(&self, watcher: &WatcherId) -> Result<String> {
		self.storage
			.hget(keys::resource_by_watcher(), &watcher.to_key())
			.await?
			.ok_or(Error::NotFound)
	}

	pub async fn watchers_for(&self, resource: &str) -> Result<Vec<WatcherId>> {
		let raw = self.storage.sgetall(&keys::watchers_by_resource(resource)).await?;
		Ok(raw.into_iter().filter_map(|s| WatcherId::parse(&s).ok()).collect())
	}

	/// Seconds remaining until `watcher`'s subscription expires, derived
	/// from its live timer.
	#[must_use]
	pub fn expires_in(&self, watcher: &WatcherId) -> Option<u64> {
		self.timers
			.lock()
			.get(watcher)
			.map(|handle| handle.deadline().saturating_sub(clock::now()))
	}

	#[must_use]
	pub fn is_tracked(&self, watcher: &WatcherId) -> bool { self.timers.lock().contains_key(watcher) }

	fn set_watcher_timer(&self, watcher: &WatcherId, delay_secs: u64) {
		let mut timers = self.timers.lock();
		if let Some(handle) = timers.get(watcher) {
			handle.reset(Duration::from_secs(delay_secs));
		} else {
			let weak = self.self_weak.clone();
			let watcher_for_timer = watcher.clone();
			let handle = clock::schedule(
				Duration::from_secs(delay_secs),
				Arc::new(move || {
					let weak = weak.clone();
					let watcher = watcher_for_timer.clone();
					Box::pin(async move {
						if let Some(registry) = weak.upgrade() {
							if let Err(e) = registry.remove_watcher(&watcher).await {
								if !matches!(e, Error::NotFound) {
									warn!(%watcher, error = %e, "expiry removal of watcher failed");
								}
							}
						}
					})
				}),
			);
			timers.insert(watcher.clone(), handle);
		}
		drop(timers);
		self.store_watcher_timer(watcher, delay_secs);
	}

	fn store_watcher_timer(&self, watcher: &WatcherId, delay_secs: u64) {
		let key = watcher.to_key();
		let expiresat = clock::now().saturating_add(delay_secs);
		let storage = Arc::clone(&self.storage);
		tokio::spawn(async move {
			if let Err(e) = storage
				.hset(keys::watcher_timers(), &key, &expiresat.to_string())
				.await
			{
				warn!(error = %e, "failed to persist watcher timer");
			}
		});
	}

	fn drop_watcher_timer(&self, watcher: &WatcherId) {
		let key = watcher.to_key();
		let storage = Arc::clone(&self.storage);
		tokio::spawn(async move {
			storage.hdel(keys::watcher_timers(), &key).await.ok();
		});
	}

	async fn load_watcher_timers(&self) {
		let timers = match self.storage.hgetall(keys::watcher_timers()).await {
			| Ok(timers) => timers,
			| Err(e) => {
				warn!(error = %e, "failed to load watcher timers");
				return;
			},
		};

		let now = clock::now();
		for (key, expiresat) in timers {
			let Ok(watcher) = WatcherId::parse(&key) else {
				warn!(key, "malformed watcher timer key");
				continue;
			};
			let Ok(expiresat) = expiresat.parse::<u64>() else {
				warn!(key, expiresat, "malformed watcher timer expiry");
				continue;
			};

			if expiresat <= now {
				self.storage.hdel(keys::watcher_timers(), &key).await.ok();
			} else {
				self.set_watcher_timer(&watcher, expiresat - now);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use presencer_database::MemoryStorage;

	use super::*;

	fn registry() -> Arc<WatcherRegistry> { WatcherRegistry::new(Arc::new(MemoryStorage::new())) }

	fn watcher(n: &str) -> WatcherId { WatcherId::new("call1", "tag-a", n).unwrap() }

	#[tokio::test]
	async fn add_then_lookup_resource() {
		let registry = registry();
		let w = watcher("tag-b");
		registry.add_watcher(&w, "a@x", 600).await.unwrap();
		assert_eq!(registry.resource_for(&w).await.unwrap(), "a@x");
		assert_eq!(registry.watchers_for("a@x").await.unwrap(), vec![w]);
	}

	#[tokio::test]
	async fn update_unknown_watcher_is_internal_error() {
		let registry = registry();
		let w = watcher("tag-c");
		let result = registry.update_watcher(&w, 600);
		assert!(matches!(result, Err(Error::Internal(_))));
	}

	#[tokio::test]
	async fn remove_unknown_watcher_is_not_found() {
		let registry = registry();
		let w = watcher("tag-d");
		let result = registry.remove_watcher(&w).await;
		assert!(matches!(result, Err(Error::NotFound)));
	}

	#[tokio::test]
	async fn remove_drops_from_resource_set() {
		let registry = registry();
		let w = watcher("tag-e");
		registry.add_watcher(&w, "a@x", 600).await.unwrap();
		registry.remove_watcher(&w).await.unwrap();
		assert!(registry.watchers_for("a@x").await.unwrap().is_empty());
	}
}
