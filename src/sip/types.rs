//! Contract types for the collaborators this layer does not implement: the
//! SIP transaction/transport stack and its dialog store. A real deployment
//! plugs concrete implementations of [`DialogFactory`] and
//! [`NotifyTransport`] in from its transport crate; this workspace only
//! specifies the contract they must satisfy.

use async_trait::async_trait;
use presencer_core::Result;
use presencer_service::WatcherId;

/// A PUBLISH request as handed to this layer by the transport stack, already
/// stripped of transaction/routing concerns.
#[derive(Clone, Debug, Default)]
pub struct PublishRequest {
	/// `user@host` parsed from the request URI.
	pub resource: String,
	pub event: Option<String>,
	pub content_type: Option<String>,
	/// `None` means the request omitted `Expires`.
	pub expires: Option<u64>,
	pub if_match: Option<String>,
	pub body: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SipResponse {
	pub status: u16,
	pub reason: &'static str,
	pub headers: Vec<(String, String)>,
}

impl SipResponse {
	#[must_use]
	pub fn new(status: u16, reason: &'static str) -> Self {
		Self { status, reason, headers: Vec::new() }
	}

	#[must_use]
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}
}

/// A SUBSCRIBE request. `dialog` is `Some` for an in-dialog (refresh or
/// termination) request and `None` for an initial, out-of-dialog request.
#[derive(Clone, Debug, Default)]
pub struct SubscribeRequest {
	pub dialog: Option<WatcherId>,
	pub has_to_tag: bool,
	pub event: Option<String>,
	pub expires: u64,
	/// `user@host` parsed from the request URI; only meaningful when
	/// `dialog` is `None`.
	pub resource: Option<String>,
}

/// Creates the dialog backing a new subscription and returns its identifier.
/// Out of scope: the dialog's actual SIP transaction-layer bookkeeping.
#[async_trait]
pub trait DialogFactory: Send + Sync {
	async fn create_dialog(&self, resource: &str) -> Result<WatcherId>;

	async fn remove_dialog(&self, watcher: &WatcherId) -> Result<()>;
}

/// Sends a NOTIFY for `watcher` carrying `pidf` with the given subscription
/// state and remaining lifetime. Out of scope: SIP transaction retries.
#[async_trait]
pub trait NotifyTransport: Send + Sync {
	async fn send_notify(
		&self,
		watcher: &WatcherId,
		pidf: &str,
		state: SubscriptionState,
		expires_secs: u64,
	) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
	Active,
	Terminated,
}

impl SubscriptionState {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			| Self::Active => "active",
			| Self::Terminated => "terminated",
		}
	}
}
