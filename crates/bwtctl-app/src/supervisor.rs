//! Daemon lifecycle supervision
//!
//! The [`Supervisor`] owns the watch-set, the plugin settings and at most one
//! live daemon. Every operation is synchronous and runs on the caller's
//! thread; the only background work is the reader task of the live daemon.
//!
//! ```text
//! Stopped ──start()──▶ Starting ──spawned──▶ Running
//!    ▲                    │                     │
//!    └──── error ─────────┘                     │
//!    └──────────────── stop() / close() ────────┘
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

use bwtctl_core::prelude::*;
use bwtctl_core::{DaemonEvent, Generation, Network, SupervisorState};
use bwtctl_daemon::{
    allocate_ephemeral_port, DaemonConfig, LaunchRequest, Launcher, ReadyHook, RunningDaemon,
};

use crate::config::PluginSettings;
use crate::handoff::HandoffController;
use crate::host::{Host, WalletInfo};
use crate::watch_set::WatchSet;

pub struct Supervisor {
    host: Arc<dyn Host>,
    launcher: Arc<dyn Launcher>,
    handoff: Arc<HandoffController>,
    settings: PluginSettings,
    watch_set: WatchSet,
    state: SupervisorState,
    process: Option<Box<dyn RunningDaemon>>,
    port: Option<u16>,
    generation: Generation,
    event_tx: mpsc::Sender<DaemonEvent>,
}

impl Supervisor {
    /// Create a supervisor, loading the plugin settings from `host`.
    ///
    /// Daemon events of every launch are sent to `event_tx`.
    pub fn new(
        host: Arc<dyn Host>,
        launcher: Arc<dyn Launcher>,
        event_tx: mpsc::Sender<DaemonEvent>,
    ) -> Self {
        let network = match Network::from_chain_identity(&host.chain_identity()) {
            Ok(network) => network,
            Err(e) => {
                // surfaced again by start(); defaults only need some network
                warn!("{}; using mainnet defaults for settings", e);
                Network::Bitcoin
            }
        };
        let settings = PluginSettings::load(host.as_ref(), network);
        Self::with_settings(host, launcher, event_tx, settings)
    }

    /// Create a supervisor with explicit settings
    pub fn with_settings(
        host: Arc<dyn Host>,
        launcher: Arc<dyn Launcher>,
        event_tx: mpsc::Sender<DaemonEvent>,
        settings: PluginSettings,
    ) -> Self {
        let handoff = Arc::new(HandoffController::new(Arc::clone(&host)));
        Self {
            host,
            launcher,
            handoff,
            settings,
            watch_set: WatchSet::new(),
            state: SupervisorState::Stopped,
            process: None,
            port: None,
            generation: Generation::default(),
            event_tx,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────

    /// (Re)start the daemon for the current watch-set.
    ///
    /// Does nothing unless the plugin is enabled and at least one wallet is
    /// registered. Any running instance is stopped first, so there is never
    /// more than one.
    pub fn start(&mut self) -> Result<()> {
        if !self.settings.enabled {
            debug!("bwt is disabled, not starting");
            return Ok(());
        }
        if self.watch_set.is_empty() {
            debug!("No watched wallets, not starting");
            return Ok(());
        }

        self.stop();
        self.state = SupervisorState::Starting;

        match self.launch() {
            Ok(true) => {
                self.state = SupervisorState::Running;
                Ok(())
            }
            Ok(false) => {
                self.state = SupervisorState::Stopped;
                Ok(())
            }
            Err(e) => {
                error!("Failed to start bwt: {}", e);
                self.state = SupervisorState::Stopped;
                Err(e)
            }
        }
    }

    /// Returns false when no wallet contributed usable key material
    fn launch(&mut self) -> Result<bool> {
        let chain = self.host.chain_identity();
        let port = allocate_ephemeral_port()?;
        let config = DaemonConfig::build(
            &chain,
            &self.watch_set.wallets(),
            &self.settings.launch_options(),
            port,
        )?;

        if !config.has_key_material() {
            warn!("None of the watched wallets has usable keys, not starting bwt");
            return Ok(false);
        }

        let program = self
            .launcher
            .resolve_program(self.settings.daemon_path.as_deref())?;

        let generation = self.generation.next();
        self.generation = generation;
        self.handoff.prepare(generation, port);

        debug!("bwt {} args: {}", generation, config.to_redacted_args().join(" "));

        let request = LaunchRequest {
            program,
            args: config.to_args(),
            generation,
            port,
            event_tx: self.event_tx.clone(),
            on_ready: Some(self.ready_hook()),
        };

        match self.launcher.launch(request) {
            Ok(process) => {
                info!(
                    "bwt {} running for {} wallet(s) on port {}",
                    generation,
                    self.watch_set.len(),
                    port
                );
                self.process = Some(process);
                self.port = Some(port);
                Ok(true)
            }
            Err(e) => {
                self.handoff.disarm();
                Err(e)
            }
        }
    }

    /// Hook run by the reader task; the handoff ignores superseded launches
    fn ready_hook(&self) -> ReadyHook {
        let handoff = Arc::clone(&self.handoff);
        Arc::new(move |generation: Generation, port: u16| {
            if let Err(e) = handoff.activate(generation, port) {
                error!("Failed to switch host to bwt on port {}: {}", port, e);
            }
        })
    }

    /// Terminate the running daemon, if any. Does not wait for it to exit.
    pub fn stop(&mut self) {
        self.handoff.disarm();
        self.port = None;
        self.state = SupervisorState::Stopped;

        if let Some(mut process) = self.process.take() {
            info!("Stopping bwt {}", process.generation());
            process.terminate();
        }
    }

    /// Stop the daemon and put the host's overrides back
    pub fn close(&mut self) {
        self.stop();
        self.handoff.restore();
    }

    // ─────────────────────────────────────────────────────────────
    // Watch-set
    // ─────────────────────────────────────────────────────────────

    /// Add a wallet and restart if the watch-set changed.
    ///
    /// Wallets that are not watch-only, or have no public keys, are skipped
    /// with a warning. Only a failed restart is an error.
    pub fn register(&mut self, wallet: &WalletInfo) -> Result<()> {
        let watched = match WatchSet::admit(wallet) {
            Ok(watched) => watched,
            Err(e) => {
                warn!("Not watching wallet: {}", e);
                return Ok(());
            }
        };

        if self.watch_set.insert(watched) {
            info!("Watching wallet {}", wallet.id);
            self.start()?;
        }
        Ok(())
    }

    /// Register several wallets, starting at most once
    pub fn register_all(&mut self, wallets: &[WalletInfo]) -> Result<()> {
        let mut changed = false;
        for wallet in wallets {
            match WatchSet::admit(wallet) {
                Ok(watched) => {
                    if self.watch_set.insert(watched) {
                        info!("Watching wallet {}", wallet.id);
                        changed = true;
                    }
                }
                Err(e) => warn!("Not watching wallet: {}", e),
            }
        }

        if changed {
            self.start()?;
        }
        Ok(())
    }

    /// Remove a wallet; stops the daemon once nothing is left to watch
    pub fn unregister(&mut self, wallet_id: &str) {
        if !self.watch_set.remove(wallet_id) {
            return;
        }
        info!("No longer watching wallet {}", wallet_id);

        if self.watch_set.is_empty() {
            self.stop();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Settings
    // ─────────────────────────────────────────────────────────────

    /// Whether there is anything to configure
    pub fn ensure_configurable(&self) -> Result<()> {
        if self.watch_set.is_empty() {
            return Err(Error::NoWatchOnlyWallets);
        }
        Ok(())
    }

    /// Validate, enable, persist and restart with new settings
    pub fn apply_settings(&mut self, mut settings: PluginSettings) -> Result<()> {
        settings.validate()?;
        settings.enabled = true;
        settings.save(self.host.as_ref())?;
        self.settings = settings;
        self.start()
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// RPC port of the running daemon
    pub fn port(&self) -> Option<u16> {
        match self.state {
            SupervisorState::Running => self.port,
            _ => None,
        }
    }

    /// Generation of the most recent launch
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether `generation` is the live launch
    pub fn is_current(&self, generation: Generation) -> bool {
        self.state == SupervisorState::Running && self.generation == generation
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.watch_set
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if self.process.is_some() {
            warn!("Supervisor dropped with bwt still running");
            self.stop();
        }
    }
}
