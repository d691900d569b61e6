pub mod panic;
pub mod signals;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use presencer_admin::AdminCommand;
use presencer_core::{Config, Result, log};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "presencer", version, about = "A SIP presence server")]
pub struct Args {
	/// Path to a TOML configuration file. Overridden by `PRESENCER_*` env vars.
	#[arg(long, short)]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Option<AdminCommand>,
}

/// Parses arguments, loads configuration, and either runs a one-shot admin
/// command or starts the server and blocks until shutdown.
pub async fn run() -> Result<()> {
	panic::init();
	let args = Args::parse();
	let config = Config::load(args.config.as_deref())?;
	log::init(&config.log);

	let services = Arc::new(presencer_router::start(&config).await?);

	if let Some(command) = args.command {
		let output = presencer_admin::dispatch(command, &services.engine, &services.registry).await?;
		println!("{output}");
		return Ok(());
	}

	info!("presence server starting");
	tokio::spawn(signals::enable(Arc::clone(&services)));

	if let Err(e) = presencer_router::run(&services).await {
		error!(error = %e, "server run loop failed");
	}

	presencer_router::stop(&services).await?;
	info!("presence server stopped");
	Ok(())
}
