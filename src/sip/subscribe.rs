use std::sync::Arc;

use presencer_core::{Error, Result};
use presencer_service::{PresenceEngine, WatcherRegistry};

use crate::{
	pidf::build_pidf,
	types::{DialogFactory, NotifyTransport, SipResponse, SubscribeRequest, SubscriptionState},
};

const EVENT: &str = "presence";

/// Handles a SUBSCRIBE request, covering the initial, refresh, and
/// termination transitions of the subscription state machine.
pub async fn handle_subscribe(
	engine: &PresenceEngine,
	registry: &WatcherRegistry,
	dialogs: &dyn DialogFactory,
	notifier: &dyn NotifyTransport,
	request: SubscribeRequest,
) -> Result<SipResponse> {
	if request.event.as_deref() != Some(EVENT) {
		return Ok(SipResponse::new(489, "Bad Event").with_header("Allow-Event", EVENT));
	}

	if request.dialog.is_none() && request.has_to_tag {
		return Ok(SipResponse::new(481, "Call/Transaction Does Not Exist"));
	}

	let expires = request.expires;

	match request.dialog {
		| Some(watcher) if expires == 0 => {
			notify(engine, registry, notifier, &watcher, SubscriptionState::Terminated, 0).await?;
			registry.remove_watcher(&watcher).await?;
			dialogs.remove_dialog(&watcher).await?;
		},
		| Some(watcher) => {
			registry.update_watcher(&watcher, expires)?;
			notify(engine, registry, notifier, &watcher, SubscriptionState::Active, expires).await?;
		},
		| None => {
			let resource = request.resource.filter(|r| !r.is_empty());
			let Some(resource) = resource else {
				return Ok(SipResponse::new(404, "Bad resource URI"));
			};

			let watcher = dialogs.create_dialog(&resource).await?;
			registry.add_watcher(&watcher, &resource, expires).await?;
			notify(engine, registry, notifier, &watcher, SubscriptionState::Active, expires).await?;
		},
	}

	Ok(SipResponse::new(200, "OK").with_header("Expires", expires.to_string()))
}

async fn notify(
	engine: &PresenceEngine,
	registry: &WatcherRegistry,
	notifier: &dyn NotifyTransport,
	watcher: &presencer_service::WatcherId,
	state: SubscriptionState,
	expires: u64,
) -> Result<()> {
	let resource = registry.resource_for(watcher).await?;
	let statuses = engine.get_status(&resource, None).await?;
	let pidf = build_pidf(&resource, &statuses);
	notifier.send_notify(watcher, &pidf, state, expires).await
}

/// Registers an observer on the presence engine that fans a status change
/// out to every watcher of the changed resource, using a fresh NOTIFY for
/// each. This is the "change propagation" half of the watcher/NOTIFY engine.
pub fn install_notify_observer(
	engine: &Arc<PresenceEngine>,
	registry: Arc<WatcherRegistry>,
	notifier: Arc<dyn NotifyTransport>,
) {
	engine.watch(Arc::new(move |resource: String, statuses| {
		let registry = Arc::clone(&registry);
		let notifier = Arc::clone(&notifier);
		Box::pin(async move {
			let watchers = match registry.watchers_for(&resource).await {
				| Ok(watchers) => watchers,
				| Err(e) => {
					tracing::warn!(resource, error = %e, "failed to list watchers for notification");
					return;
				},
			};
			if watchers.is_empty() {
				return;
			}

			let pidf = build_pidf(&resource, &statuses);
			for watcher in watchers {
				let expires = registry.expires_in(&watcher).unwrap_or(0);
				if let Err(e) = notifier
					.send_notify(&watcher, &pidf, SubscriptionState::Active, expires)
					.await
				{
					tracing::warn!(%watcher, error = %e, "failed to send notify");
				}
			}
		})
	}));
}
