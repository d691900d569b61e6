use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use presencer_core::Result;

/// A callback invoked after the storage backend (re)establishes its
/// connection. Registered callbacks must be idempotent: they may be called
/// after a reconnect that did not actually lose any state.
pub type ReconnectCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Key-value primitives the presence and watcher engines are built on: a
/// hash-map-per-key and a set-per-key, both namespaced by an opaque string
/// key. A missing key behaves like an empty map or set; only a genuine
/// backend failure surfaces as an `Err`.
#[async_trait]
pub trait Storage: Send + Sync {
	async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

	async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

	async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;

	async fn hdel(&self, key: &str, field: &str) -> Result<()>;

	async fn sadd(&self, key: &str, member: &str) -> Result<()>;

	async fn srem(&self, key: &str, member: &str) -> Result<()>;

	async fn sgetall(&self, key: &str) -> Result<Vec<String>>;

	/// Registers `callback` to run every time the backend reestablishes a
	/// connection after having lost one. Implementations that never lose a
	/// connection (e.g. the in-memory test backend) may simply drop it.
	fn on_reconnect(&self, callback: ReconnectCallback);
}
