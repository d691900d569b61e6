use std::process::ExitCode;

use presencer::run;
use tracing::error;

fn main() -> ExitCode {
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.expect("failed to build tokio runtime");

	match runtime.block_on(run()) {
		| Ok(()) => ExitCode::SUCCESS,
		| Err(e) => {
			error!(error = %e, "fatal error");
			ExitCode::FAILURE
		},
	}
}
