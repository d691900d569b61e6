pub mod bus;
pub mod presence;
pub mod watchers;

pub use presence::{PresenceEngine, Status, aggregate_status};
pub use watchers::{WatcherId, WatcherRegistry};
