use std::sync::Arc;

use presencer_router::Services;
use tokio::signal;
use tracing::warn;

#[cfg(unix)]
pub async fn enable(services: Arc<Services>) {
	use signal::unix::{self, SignalKind};

	let mut quit = unix::signal(SignalKind::quit()).expect("SIGQUIT handler");
	let mut term = unix::signal(SignalKind::terminate()).expect("SIGTERM handler");
	let mut usr1 = unix::signal(SignalKind::user_defined1()).expect("SIGUSR1 handler");
	let mut usr2 = unix::signal(SignalKind::user_defined2()).expect("SIGUSR2 handler");

	let sig = tokio::select! {
		_ = signal::ctrl_c() => "SIGINT",
		_ = quit.recv() => "SIGQUIT",
		_ = term.recv() => "SIGTERM",
		_ = usr1.recv() => "SIGUSR1",
		_ = usr2.recv() => "SIGUSR2",
	};

	warn!("received {sig}, shutting down");
	services.shutdown();
}

#[cfg(not(unix))]
pub async fn enable(services: Arc<Services>) {
	let _ = signal::ctrl_c().await;
	warn!("received ctrl-c, shutting down");
	services.shutdown();
}
