//! The presence event package: request handling for PUBLISH and SUBSCRIBE,
//! PIDF document construction, and the contract types a transport layer
//! plugs into to exchange these handlers for real SIP messages.

pub mod pidf;
pub mod publish;
pub mod subscribe;
pub mod types;

pub use publish::handle_publish;
pub use subscribe::{handle_subscribe, install_notify_observer};
