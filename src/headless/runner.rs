//! Headless runner - supervises the daemon for a fixed set of wallets
//!
//! Stands in for the wallet host: the wallets come from a TOML file, the
//! settings and server overrides live in bwtctl's own config file, and every
//! daemon event is printed as a [`HeadlessEvent`].

use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;

use bwtctl_app::{Host, ProcessLauncher, SettingsStore, StandaloneHost, Supervisor, WalletInfo};
use bwtctl_core::prelude::*;
use bwtctl_core::DaemonEvent;

use super::signals::wait_for_signal;
use super::HeadlessEvent;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What `bwtctl run` was asked to do
#[derive(Debug, Clone)]
pub struct HeadlessOptions {
    /// Chain identity of the emulated host (`mainnet`, `testnet`, `regtest`)
    pub chain: String,
    /// TOML file listing the wallets to watch
    pub wallets_path: PathBuf,
    /// Settings file; the platform config dir when `None`
    pub config_path: Option<PathBuf>,
}

/// Commands accepted on stdin, one per line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Restart,
    Status,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "r" | "restart" => Some(Command::Restart),
            "s" | "status" => Some(Command::Status),
            "q" | "quit" => Some(Command::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WalletFile {
    #[serde(default, rename = "wallet")]
    wallets: Vec<WalletInfo>,
}

/// Read `[[wallet]]` entries from a TOML file
pub fn load_wallets(path: &Path) -> Result<Vec<WalletInfo>> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let file: WalletFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse wallets from {}", path.display()))?;
    Ok(file.wallets)
}

/// Run in headless mode until the daemon exits, `quit` is read from stdin or
/// the process is signalled
pub async fn run_headless(options: &HeadlessOptions) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("bwtctl starting in HEADLESS mode");
    info!("Chain: {}", options.chain);
    info!("Wallets: {}", options.wallets_path.display());
    info!("═══════════════════════════════════════════════════════");

    let wallets = load_wallets(&options.wallets_path)?;
    let store = match &options.config_path {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::default_location()?,
    };
    let host: Arc<dyn Host> = Arc::new(StandaloneHost::new(options.chain.clone(), store)?);

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let mut supervisor = Supervisor::new(host, Arc::new(ProcessLauncher::current()), event_tx);

    let (command_tx, command_rx) = mpsc::channel(8);
    std::thread::spawn(move || {
        read_stdin_commands(command_tx);
    });

    let mut stdout = io::stdout();
    let result = run_session(
        &mut supervisor,
        &wallets,
        event_rx,
        command_rx,
        wait_for_signal(),
        &mut stdout,
    )
    .await;

    info!("bwtctl headless mode exiting");
    result
}

/// Register `wallets`, relay daemon events to `out` and shut down cleanly.
///
/// The host configuration is restored on every exit path once registration
/// has been attempted.
pub async fn run_session<W, F>(
    supervisor: &mut Supervisor,
    wallets: &[WalletInfo],
    mut events: mpsc::Receiver<DaemonEvent>,
    mut commands: mpsc::Receiver<Command>,
    shutdown: F,
    out: &mut W,
) -> Result<()>
where
    W: Write,
    F: Future<Output = Result<()>>,
{
    if !supervisor.settings().enabled {
        let e = Error::config("bwt is disabled (run `bwtctl config set enabled true`)");
        emit(out, &HeadlessEvent::error(e.to_string(), true));
        return Err(e);
    }

    if let Err(e) = supervisor.register_all(wallets) {
        emit(out, &HeadlessEvent::error(e.to_string(), e.is_fatal()));
        supervisor.close();
        emit(out, &HeadlessEvent::stopped(Some(e.to_string())));
        return Err(e);
    }

    let Some(port) = supervisor.port() else {
        let e = Error::NoWatchOnlyWallets;
        emit(out, &HeadlessEvent::error(e.to_string(), true));
        supervisor.close();
        emit(out, &HeadlessEvent::stopped(Some(e.to_string())));
        return Err(e);
    };
    emit(
        out,
        &HeadlessEvent::started(supervisor.generation().0, port, supervisor.watch_set().len()),
    );

    tokio::pin!(shutdown);
    let mut commands_open = true;

    let reason = loop {
        tokio::select! {
            biased;

            event = events.recv() => match event {
                Some(event) => {
                    emit(out, &HeadlessEvent::from(&event));
                    if matches!(event, DaemonEvent::OutputClosed { .. })
                        && supervisor.is_current(event.generation())
                    {
                        warn!("bwt daemon {} exited", event.generation());
                        break Some("daemon exited".to_string());
                    }
                }
                None => break Some("event channel closed".to_string()),
            },

            command = commands.recv(), if commands_open => match command {
                Some(Command::Quit) => {
                    info!("Stdin: quit requested");
                    break None;
                }
                Some(Command::Restart) => {
                    info!("Stdin: restart requested");
                    restart(supervisor, out);
                }
                Some(Command::Status) => emit(
                    out,
                    &HeadlessEvent::status(
                        supervisor.state(),
                        supervisor.generation().0,
                        supervisor.port(),
                        supervisor.watch_set().len(),
                    ),
                ),
                None => {
                    debug!("Stdin closed, ignoring further commands");
                    commands_open = false;
                }
            },

            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Signal handler error: {}", e);
                }
                break Some("signal".to_string());
            }
        }
    };

    supervisor.close();
    emit(out, &HeadlessEvent::stopped(reason));
    Ok(())
}

fn restart<W: Write>(supervisor: &mut Supervisor, out: &mut W) {
    match supervisor.start() {
        Ok(()) => match supervisor.port() {
            Some(port) => emit(
                out,
                &HeadlessEvent::started(
                    supervisor.generation().0,
                    port,
                    supervisor.watch_set().len(),
                ),
            ),
            None => emit(out, &HeadlessEvent::error("bwt daemon is not running", false)),
        },
        Err(e) => emit(out, &HeadlessEvent::error(e.to_string(), e.is_fatal())),
    }
}

/// Write an event, logging instead of failing when stdout is gone
fn emit<W: Write>(out: &mut W, event: &HeadlessEvent) {
    if let Err(e) = event.write_to(out) {
        error!("Failed to write headless event: {}", e);
    }
}

/// Forward stdin commands until stdin closes (blocking)
fn read_stdin_commands(command_tx: mpsc::Sender<Command>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) => match Command::parse(&line) {
                Some(command) => {
                    if command_tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => warn!("Stdin: unknown command '{}'", line.trim()),
            },
            Err(e) => {
                error!("Stdin read error: {}", e);
                break;
            }
        }
    }
    debug!("Stdin reader exiting");
}
