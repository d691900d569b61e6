//! In-memory [`Storage`] backend used by unit and integration tests so they
//! do not require a live Redis server.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use presencer_core::Result;

use crate::adaptor::{ReconnectCallback, Storage};

#[derive(Default)]
pub struct MemoryStorage {
	hashes: Mutex<HashMap<String, HashMap<String, String>>>,
	sets: Mutex<HashMap<String, HashSet<String>>>,
}

impl MemoryStorage {
	#[must_use]
	pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl Storage for MemoryStorage {
	async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
		self.hashes
			.lock()
			.entry(key.to_owned())
			.or_default()
			.insert(field.to_owned(), value.to_owned());
		Ok(())
	}

	async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
		Ok(self
			.hashes
			.lock()
			.get(key)
			.and_then(|h| h.get(field))
			.cloned())
	}

	async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
		Ok(self.hashes.lock().get(key).cloned().unwrap_or_default())
	}

	async fn hdel(&self, key: &str, field: &str) -> Result<()> {
		if let Some(h) = self.hashes.lock().get_mut(key) {
			h.remove(field);
		}
		Ok(())
	}

	async fn sadd(&self, key: &str, member: &str) -> Result<()> {
		self.sets
			.lock()
			.entry(key.to_owned())
			.or_default()
			.insert(member.to_owned());
		Ok(())
	}

	async fn srem(&self, key: &str, member: &str) -> Result<()> {
		if let Some(s) = self.sets.lock().get_mut(key) {
			s.remove(member);
		}
		Ok(())
	}

	async fn sgetall(&self, key: &str) -> Result<Vec<String>> {
		Ok(self
			.sets
			.lock()
			.get(key)
			.map(|s| s.iter().cloned().collect())
			.unwrap_or_default())
	}

	fn on_reconnect(&self, _callback: ReconnectCallback) {
		// The in-memory backend never disconnects; nothing to hook.
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn hash_roundtrip() {
		let store = MemoryStorage::new();
		store.hset("res:a@x", "tag1", "v1").await.unwrap();
		assert_eq!(
			store.hget("res:a@x", "tag1").await.unwrap(),
			Some("v1".to_owned())
		);
		store.hdel("res:a@x", "tag1").await.unwrap();
		assert_eq!(store.hget("res:a@x", "tag1").await.unwrap(), None);
	}

	#[tokio::test]
	async fn set_roundtrip() {
		let store = MemoryStorage::new();
		store.sadd("sys:resources", "a@x").await.unwrap();
		store.sadd("sys:resources", "b@x").await.unwrap();
		let mut members = store.sgetall("sys:resources").await.unwrap();
		members.sort();
		assert_eq!(members, vec!["a@x".to_owned(), "b@x".to_owned()]);
		store.srem("sys:resources", "a@x").await.unwrap();
		assert_eq!(store.sgetall("sys:resources").await.unwrap(), vec!["b@x".to_owned()]);
	}

	#[tokio::test]
	async fn missing_key_is_empty_not_error() {
		let store = MemoryStorage::new();
		assert!(store.hgetall("res:nobody").await.unwrap().is_empty());
		assert!(store.sgetall("sys:nothing").await.unwrap().is_empty());
	}
}
