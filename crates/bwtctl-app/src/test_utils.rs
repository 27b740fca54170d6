//! Test doubles for the supervisor
//!
//! [`FakeLauncher`] records every launch instead of spawning a process and
//! lets a test fire the readiness hook of any recorded launch.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use bwtctl_core::prelude::*;
use bwtctl_core::{DaemonEvent, Generation};
use bwtctl_daemon::{LaunchRequest, Launcher, ReadyHook, RunningDaemon};

use crate::host::{WalletInfo, WalletKind};

/// What a launch looked like
#[derive(Clone)]
pub struct RecordedLaunch {
    pub args: Vec<String>,
    pub generation: Generation,
    pub port: u16,
    pub event_tx: mpsc::Sender<DaemonEvent>,
    on_ready: Option<ReadyHook>,
    terminated: Arc<Mutex<u32>>,
}

impl RecordedLaunch {
    /// Invoke the readiness hook as the reader task would
    pub fn fire_ready(&self) {
        if let Some(hook) = &self.on_ready {
            hook(self.generation, self.port);
        }
    }

    /// How many times `terminate` was called on this instance
    pub fn terminate_count(&self) -> u32 {
        *self.terminated.lock().unwrap()
    }

    /// Value following `flag` in the argument list
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .windows(2)
            .find(|w| w[0] == flag)
            .map(|w| w[1].as_str())
    }

    pub fn count_flag(&self, flag: &str) -> usize {
        self.args.iter().filter(|a| *a == flag).count()
    }
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    launches: Arc<Mutex<Vec<RecordedLaunch>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launches(&self) -> Vec<RecordedLaunch> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<RecordedLaunch> {
        self.launches.lock().unwrap().last().cloned()
    }

    /// Make subsequent launches fail with a spawn error
    pub fn fail_next(&self, reason: &str) {
        *self.fail_with.lock().unwrap() = Some(reason.to_string());
    }

    /// Total `terminate` calls across all launches
    pub fn total_terminations(&self) -> u32 {
        self.launches()
            .iter()
            .map(RecordedLaunch::terminate_count)
            .sum()
    }
}

impl Launcher for FakeLauncher {
    fn resolve_program(&self, configured: Option<&Path>) -> Result<PathBuf> {
        Ok(configured.map_or_else(|| PathBuf::from("bwt"), Path::to_path_buf))
    }

    fn launch(&self, request: LaunchRequest) -> Result<Box<dyn RunningDaemon>> {
        if let Some(reason) = self.fail_with.lock().unwrap().take() {
            return Err(Error::process_spawn(reason));
        }

        let terminated = Arc::new(Mutex::new(0));
        self.launches.lock().unwrap().push(RecordedLaunch {
            args: request.args,
            generation: request.generation,
            port: request.port,
            event_tx: request.event_tx,
            on_ready: request.on_ready,
            terminated: Arc::clone(&terminated),
        });

        Ok(Box::new(FakeDaemon {
            generation: request.generation,
            terminated,
        }))
    }
}

struct FakeDaemon {
    generation: Generation,
    terminated: Arc<Mutex<u32>>,
}

impl RunningDaemon for FakeDaemon {
    fn id(&self) -> Option<u32> {
        None
    }

    fn generation(&self) -> Generation {
        self.generation
    }

    fn terminate(&mut self) {
        *self.terminated.lock().unwrap() += 1;
    }
}

/// Watch-only single-key wallet
pub fn watch_only_wallet(id: &str, xpub: &str) -> WalletInfo {
    WalletInfo {
        id: id.to_string(),
        kind: WalletKind::Standard,
        master_public_keys: vec![xpub.to_string()],
        script_type: None,
        watch_only: true,
    }
}

/// Watch-only multisig wallet
pub fn multisig_wallet(id: &str, threshold: usize, script_type: &str, xpubs: Vec<String>) -> WalletInfo {
    WalletInfo {
        id: id.to_string(),
        kind: WalletKind::Multisig { threshold },
        master_public_keys: xpubs,
        script_type: Some(script_type.to_string()),
        watch_only: true,
    }
}
