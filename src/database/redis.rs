//! Redis-backed [`Storage`]. The schema's hashes and sets map directly onto
//! `HSET`/`HGET`/`HGETALL`/`HDEL` and `SADD`/`SREM`/`SMEMBERS`.

use std::{
	collections::HashMap,
	sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use presencer_core::{Error, Result};
use redis::{AsyncCommands, aio::ConnectionManager};

use crate::adaptor::{ReconnectCallback, Storage};

pub struct RedisStorage {
	manager: ConnectionManager,
	connected: AtomicBool,
	on_reconnect: Mutex<Vec<ReconnectCallback>>,
}

impl RedisStorage {
	/// Connects to `url` (e.g. `redis://127.0.0.1/`), enabling the client's
	/// own automatic reconnection. `connected` starts false so the first
	/// successful command after construction is itself treated as a
	/// reconnect, firing the registered callbacks that load persisted
	/// timers.
	pub async fn connect(url: &str) -> Result<Self> {
		let client = redis::Client::open(url).map_err(|e| Error::storage(e.to_string()))?;
		let manager = client
			.get_connection_manager()
			.await
			.map_err(|e| Error::storage(e.to_string()))?;

		Ok(Self {
			manager,
			connected: AtomicBool::new(false),
			on_reconnect: Mutex::new(Vec::new()),
		})
	}

	/// Runs `op` against a clone of the connection manager, translating a
	/// transition from disconnected to connected into the registered
	/// reconnect callbacks.
	async fn run<T, F>(&self, op: F) -> Result<T>
	where
		F: AsyncFnOnce(&mut ConnectionManager) -> redis::RedisResult<T>,
	{
		let mut conn = self.manager.clone();
		match op(&mut conn).await {
			| Ok(value) => {
				if !self.connected.swap(true, Ordering::SeqCst) {
					self.fire_reconnect_callbacks().await;
				}
				Ok(value)
			},
			| Err(e) => {
				if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
					self.connected.store(false, Ordering::SeqCst);
				}
				Err(Error::storage(e.to_string()))
			},
		}
	}

	async fn fire_reconnect_callbacks(&self) {
		let callbacks = self.on_reconnect.lock().clone();
		for callback in callbacks {
			callback().await;
		}
	}
}

#[async_trait]
impl Storage for RedisStorage {
	async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
		let key = key.to_owned();
		let field = field.to_owned();
		let value = value.to_owned();
		self.run(async move |conn| conn.hset::<_, _, _, ()>(key, field, value).await)
			.await
	}

	async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
		let key = key.to_owned();
		let field = field.to_owned();
		self.run(async move |conn| conn.hget(key, field).await).await
	}

	async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
		let key = key.to_owned();
		self.run(async move |conn| conn.hgetall(key).await).await
	}

	async fn hdel(&self, key: &str, field: &str) -> Result<()> {
		let key = key.to_owned();
		let field = field.to_owned();
		self.run(async move |conn| conn.hdel::<_, _, ()>(key, field).await)
			.await
	}

	async fn sadd(&self, key: &str, member: &str) -> Result<()> {
		let key = key.to_owned();
		let member = member.to_owned();
		self.run(async move |conn| conn.sadd::<_, _, ()>(key, member).await)
			.await
	}

	async fn srem(&self, key: &str, member: &str) -> Result<()> {
		let key = key.to_owned();
		let member = member.to_owned();
		self.run(async move |conn| conn.srem::<_, _, ()>(key, member).await)
			.await
	}

	async fn sgetall(&self, key: &str) -> Result<Vec<String>> {
		let key = key.to_owned();
		self.run(async move |conn| conn.smembers(key).await).await
	}

	fn on_reconnect(&self, callback: ReconnectCallback) {
		self.on_reconnect.lock().push(callback);
	}
}
