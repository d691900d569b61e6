//! Operator-facing admin commands: introspection into the presence engine
//! and watcher registry without needing direct storage access.

use std::sync::Arc;

use clap::Subcommand;
use presencer_core::Result;
use presencer_service::{PresenceEngine, WatcherRegistry};

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
	/// Dumps every resource's current aggregated status and per-tag detail.
	DumpStatuses,

	/// Shows the live status detail for a single resource.
	Resource {
		/// The `user@host` identifier to look up.
		resource: String,
	},

	/// Lists every watcher currently subscribed to a resource.
	ListWatchers {
		/// The `user@host` identifier to look up.
		resource: String,
	},
}

/// Runs an [`AdminCommand`] against the live engine and registry, returning
/// its output as a single formatted block of text.
pub async fn dispatch(
	command: AdminCommand,
	engine: &Arc<PresenceEngine>,
	registry: &Arc<WatcherRegistry>,
) -> Result<String> {
	match command {
		| AdminCommand::DumpStatuses => {
			let dump = engine.dump_statuses().await?;
			if dump.is_empty() {
				return Ok("no resources have a published status".to_owned());
			}

			let mut lines = Vec::with_capacity(dump.len());
			for (resource, statuses) in dump {
				lines.push(format!("{resource}: {} tag(s)", statuses.len()));
				for (tag, status) in statuses {
					lines.push(format!("  {tag}: {}", status.presence));
				}
			}
			Ok(lines.join("\n"))
		},
		| AdminCommand::Resource { resource } => {
			let statuses = engine.get_status(&resource, None).await?;
			if statuses.is_empty() {
				return Ok(format!("{resource}: no active status"));
			}

			let mut lines = vec![format!("{resource}:")];
			for (tag, status) in statuses {
				lines.push(format!(
					"  {tag}: priority={} expires_at={} {}",
					status.priority, status.expiresat, status.presence
				));
			}
			Ok(lines.join("\n"))
		},
		| AdminCommand::ListWatchers { resource } => {
			let watchers = registry.watchers_for(&resource).await?;
			if watchers.is_empty() {
				return Ok(format!("{resource}: no watchers"));
			}

			let mut lines = vec![format!("{resource}:")];
			for watcher in watchers {
				let expires_in = registry.expires_in(&watcher).unwrap_or(0);
				lines.push(format!("  {watcher} expires_in={expires_in}s"));
			}
			Ok(lines.join("\n"))
		},
	}
}

#[cfg(test)]
mod tests {
	use presencer_database::MemoryStorage;
	use presencer_service::WatcherId;
	use serde_json::json;

	use super::*;

	fn engine() -> Arc<PresenceEngine> { PresenceEngine::new(Arc::new(MemoryStorage::new())) }
	fn registry() -> Arc<WatcherRegistry> { WatcherRegistry::new(Arc::new(MemoryStorage::new())) }

	#[tokio::test]
	async fn dump_statuses_reports_empty_store() {
		let engine = engine();
		let registry = registry();
		let out = dispatch(AdminCommand::DumpStatuses, &engine, &registry).await.unwrap();
		assert_eq!(out, "no resources have a published status");
	}

	#[tokio::test]
	async fn resource_reports_active_tags() {
		let engine = engine();
		let registry = registry();
		engine
			.put_status("a@x", json!({"status": "online"}), 100, 0, None)
			.await
			.unwrap();

		let out = dispatch(AdminCommand::Resource { resource: "a@x".to_owned() }, &engine, &registry)
			.await
			.unwrap();
		assert!(out.starts_with("a@x:"));
		assert!(out.contains("priority=0"));
	}

	#[tokio::test]
	async fn list_watchers_reports_none_for_unwatched_resource() {
		let engine = engine();
		let registry = registry();
		let out =
			dispatch(AdminCommand::ListWatchers { resource: "a@x".to_owned() }, &engine, &registry)
				.await
				.unwrap();
		assert_eq!(out, "a@x: no watchers");
	}

	#[tokio::test]
	async fn list_watchers_reports_tracked_watcher() {
		let engine = engine();
		let registry = registry();
		let watcher = WatcherId::new("call1", "from", "to").unwrap();
		registry.add_watcher(&watcher, "a@x", 600).await.unwrap();

		let out =
			dispatch(AdminCommand::ListWatchers { resource: "a@x".to_owned() }, &engine, &registry)
				.await
				.unwrap();
		assert!(out.contains(&watcher.to_string()));
	}
}
