mod config;
mod console;
mod logging;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use lhm_pi_core::{run_session, MemoryPanel, Session, SessionEvent};
use std::{env, time::Duration};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{load_config, normalize_host_args, Args};
use crate::console::SharedPanel;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse_from(normalize_host_args(env::args()));
	let config = load_config(args).context("unusable panel configuration")?;
	let _log_guard = logging::init_logging(
		&config.log_dir,
		&config.params.registration_id,
		config.log_stderr,
	);
	info!(
		endpoint = %config.endpoint(),
		policy = ?config.policy,
		"lhm_pi_client_starting"
	);

	let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
	let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
	let mut panel = SharedPanel::new(MemoryPanel::new());
	let mut session = Session::new(config.params.clone(), config.policy, out_tx, event_tx.clone());
	session.start(&panel);

	let transport_task = tokio::spawn(transport::run(config.endpoint(), out_rx, event_tx.clone()));
	let console_task = tokio::spawn(console::read_commands(panel.clone(), event_tx.clone()));
	let signal_tx = event_tx.clone();
	let signal_task = tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			let _ = signal_tx.send(SessionEvent::Closed);
		}
	});
	drop(event_tx);

	run_session(&mut session, &mut panel, &mut event_rx).await;
	drop(session);

	console_task.abort();
	signal_task.abort();
	if tokio::time::timeout(SHUTDOWN_GRACE, transport_task).await.is_err() {
		warn!("transport_shutdown_timeout");
	}
	info!("lhm_pi_client_stopped");
	// the stdin reader can still hold a blocking thread
	std::process::exit(0)
}
