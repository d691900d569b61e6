//! Literal storage key schema shared by the presence engine and the watcher
//! registry.

#[must_use]
pub fn resource_table(resource: &str) -> String { format!("res:{resource}") }

#[must_use]
pub fn resources_set() -> &'static str { "sys:resources" }

#[must_use]
pub fn timers_table() -> &'static str { "sys:timers" }

#[must_use]
pub fn timer_field(resource: &str, tag: &str) -> String { format!("{resource}:{tag}") }

#[must_use]
pub fn watchers_by_resource(resource: &str) -> String {
	format!("sys:watchers_by_resource:{resource}")
}

#[must_use]
pub fn resource_by_watcher() -> &'static str { "sys:resource_by_watcher" }

#[must_use]
pub fn watcher_timers() -> &'static str { "sys:watcher_timers" }
