//! Monotonic clock and deferred-callback timers.
//!
//! Timers support resetting their deadline in place rather than being
//! cancelled and rescheduled, so that a caller holding a [`TimerHandle`]
//! observes one continuous timer across refreshes.

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
	time::{Duration, SystemTime, UNIX_EPOCH},
};

use futures::future::BoxFuture;
use tokio::{sync::Notify, time::Instant};

pub type Callback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Seconds since the Unix epoch, used as the absolute timebase for
/// persisted expiry records.
#[must_use]
pub fn now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}

struct Inner {
	deadline: std::sync::Mutex<Instant>,
	deadline_epoch: AtomicU64,
	active: AtomicBool,
	generation: AtomicU64,
	wake: Notify,
}

/// A handle to a scheduled, cancellable, resettable timer.
#[derive(Clone)]
pub struct TimerHandle {
	inner: Arc<Inner>,
}

impl TimerHandle {
	/// Resets the timer's deadline in place. The owning task wakes, observes
	/// the new deadline, and continues sleeping without re-running the
	/// callback early.
	pub fn reset(&self, delay: Duration) {
		let deadline = Instant::now() + delay;
		*self.inner.deadline.lock().unwrap_or_else(|e| e.into_inner()) = deadline;
		self.inner
			.deadline_epoch
			.store(now().saturating_add(delay.as_secs()), Ordering::SeqCst);
		self.inner.active.store(true, Ordering::SeqCst);
		self.inner.generation.fetch_add(1, Ordering::SeqCst);
		self.inner.wake.notify_one();
	}

	/// Cancels the timer; its callback will not fire.
	pub fn cancel(&self) {
		self.inner.active.store(false, Ordering::SeqCst);
		self.inner.generation.fetch_add(1, Ordering::SeqCst);
		self.inner.wake.notify_one();
	}

	#[must_use]
	pub fn active(&self) -> bool { self.inner.active.load(Ordering::SeqCst) }

	/// Absolute deadline, in seconds since the Unix epoch.
	#[must_use]
	pub fn deadline(&self) -> u64 { self.inner.deadline_epoch.load(Ordering::SeqCst) }
}

/// Schedules `callback` to run after `delay` on the current Tokio runtime,
/// returning a handle that can reset or cancel it.
#[must_use]
pub fn schedule(delay: Duration, callback: Callback) -> TimerHandle {
	let inner = Arc::new(Inner {
		deadline: std::sync::Mutex::new(Instant::now() + delay),
		deadline_epoch: AtomicU64::new(now().saturating_add(delay.as_secs())),
		active: AtomicBool::new(true),
		generation: AtomicU64::new(0),
		wake: Notify::new(),
	});

	tokio::spawn(run_timer(Arc::clone(&inner), callback));

	TimerHandle { inner }
}

async fn run_timer(inner: Arc<Inner>, callback: Callback) {
	loop {
		if !inner.active.load(Ordering::SeqCst) {
			return;
		}

		let deadline = *inner.deadline.lock().unwrap_or_else(|e| e.into_inner());
		let generation = inner.generation.load(Ordering::SeqCst);

		tokio::select! {
			() = tokio::time::sleep_until(deadline) => {
				if !inner.active.load(Ordering::SeqCst) {
					return;
				}
				if inner.generation.load(Ordering::SeqCst) != generation {
					// Reset or cancel raced the sleep; loop and re-read the deadline.
					continue;
				}
				inner.active.store(false, Ordering::SeqCst);
				callback().await;
				return;
			},
			() = inner.wake.notified() => continue,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	#[tokio::test(start_paused = true)]
	async fn fires_after_delay() {
		let fired = Arc::new(AtomicUsize::new(0));
		let fired2 = Arc::clone(&fired);
		let handle = schedule(
			Duration::from_secs(5),
			Arc::new(move || {
				let fired = Arc::clone(&fired2);
				Box::pin(async move {
					fired.fetch_add(1, Ordering::SeqCst);
				})
			}),
		);
		assert!(handle.active());
		tokio::time::advance(Duration::from_secs(6)).await;
		tokio::task::yield_now().await;
		assert_eq!(fired.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn cancel_prevents_callback() {
		let fired = Arc::new(AtomicUsize::new(0));
		let fired2 = Arc::clone(&fired);
		let handle = schedule(
			Duration::from_secs(5),
			Arc::new(move || {
				let fired = Arc::clone(&fired2);
				Box::pin(async move {
					fired.fetch_add(1, Ordering::SeqCst);
				})
			}),
		);
		handle.cancel();
		tokio::time::advance(Duration::from_secs(6)).await;
		tokio::task::yield_now().await;
		assert_eq!(fired.load(Ordering::SeqCst), 0);
		assert!(!handle.active());
	}

	#[tokio::test(start_paused = true)]
	async fn reset_extends_deadline_without_early_fire() {
		let fired = Arc::new(AtomicUsize::new(0));
		let fired2 = Arc::clone(&fired);
		let handle = schedule(
			Duration::from_secs(2),
			Arc::new(move || {
				let fired = Arc::clone(&fired2);
				Box::pin(async move {
					fired.fetch_add(1, Ordering::SeqCst);
				})
			}),
		);
		tokio::time::advance(Duration::from_secs(1)).await;
		handle.reset(Duration::from_secs(5));
		tokio::time::advance(Duration::from_secs(3)).await;
		tokio::task::yield_now().await;
		assert_eq!(fired.load(Ordering::SeqCst), 0, "original deadline must not fire");
		tokio::time::advance(Duration::from_secs(3)).await;
		tokio::task::yield_now().await;
		assert_eq!(fired.load(Ordering::SeqCst), 1);
	}
}
