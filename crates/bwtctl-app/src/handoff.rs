//! Pointing the host at the daemon and undoing it afterwards
//!
//! The controller writes three runtime overrides (`oneserver`,
//! `skipmerklecheck`, `server`) so the host sticks to the local daemon, and
//! switches the host's active endpoint once the daemon reports readiness.
//! The first write of an activation cycle snapshots the prior override
//! values; [`HandoffController::restore`] puts them back and clears the
//! snapshot. Only the launch armed by the latest `prepare` may activate.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bwtctl_core::prelude::*;
use bwtctl_core::Generation;
use bwtctl_daemon::LOCAL_HOST;

use crate::host::{Host, NetworkParameters, OverrideKey, Protocol};

/// Override values as they were before the first activation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriorHostSettings {
    pub oneserver: Option<toml::Value>,
    pub skipmerklecheck: Option<toml::Value>,
    pub server: Option<toml::Value>,
}

impl PriorHostSettings {
    fn capture(host: &dyn Host) -> Self {
        Self {
            oneserver: host.get_override(OverrideKey::OneServer),
            skipmerklecheck: host.get_override(OverrideKey::SkipMerkleCheck),
            server: host.get_override(OverrideKey::Server),
        }
    }

    fn get(&self, key: OverrideKey) -> Option<&toml::Value> {
        match key {
            OverrideKey::OneServer => self.oneserver.as_ref(),
            OverrideKey::SkipMerkleCheck => self.skipmerklecheck.as_ref(),
            OverrideKey::Server => self.server.as_ref(),
        }
    }
}

/// Endpoint of the local daemon's Electrum RPC server
pub fn local_network_parameters(current: &NetworkParameters, port: u16) -> NetworkParameters {
    NetworkParameters {
        host: LOCAL_HOST.to_string(),
        port,
        protocol: Protocol::Tcp,
        oneserver: true,
        ..current.clone()
    }
}

/// Mutable handoff state, guarded by one lock
#[derive(Debug, Default)]
struct HandoffState {
    /// Launch whose readiness may switch the host endpoint
    live: Option<Generation>,
    snapshot: Option<PriorHostSettings>,
}

/// Shared between the supervisor and the daemon reader task.
///
/// The live generation and the snapshot share a lock, so a readiness
/// report can never slip in between `disarm`/`restore` and the host writes.
pub struct HandoffController {
    host: Arc<dyn Host>,
    state: Mutex<HandoffState>,
}

impl HandoffController {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            state: Mutex::new(HandoffState::default()),
        }
    }

    /// Pin the host to `127.0.0.1:<port>` in the override layer and make
    /// `generation` the launch allowed to activate.
    ///
    /// Snapshots the prior overrides the first time it runs in an
    /// activation cycle. Called before each spawn.
    pub fn prepare(&self, generation: Generation, port: u16) {
        let mut state = self.lock_state();
        state.live = Some(generation);
        self.pin_overrides(&mut state, port);
    }

    /// Switch the host's active endpoint to the daemon.
    ///
    /// Runs on the reader task when the daemon announces its RPC server.
    /// Returns false, touching nothing, unless `generation` is still live.
    pub fn activate(&self, generation: Generation, port: u16) -> Result<bool> {
        let mut state = self.lock_state();
        if state.live != Some(generation) {
            debug!("Ignoring readiness of stale bwt {}", generation);
            return Ok(false);
        }

        self.pin_overrides(&mut state, port);

        let current = self.host.network_parameters();
        let params = local_network_parameters(&current, port);
        info!("Switching host endpoint from {} to {}", current, params);
        self.host.set_network_parameters(params)?;
        Ok(true)
    }

    /// Stop honoring readiness of the current launch
    pub fn disarm(&self) {
        self.lock_state().live = None;
    }

    /// Put the captured overrides back. Returns false if nothing was captured.
    ///
    /// Also disarms, so a late readiness report cannot re-pin the host.
    pub fn restore(&self) -> bool {
        let mut state = self.lock_state();
        state.live = None;
        let Some(prior) = state.snapshot.take() else {
            debug!("No host overrides to restore");
            return false;
        };

        for key in OverrideKey::ALL {
            match prior.get(key) {
                Some(value) => self.host.set_override(key, value.clone()),
                None => self.host.remove_override(key),
            }
        }
        info!("Restored host overrides");
        true
    }

    fn pin_overrides(&self, state: &mut HandoffState, port: u16) {
        if state.snapshot.is_none() {
            let prior = PriorHostSettings::capture(self.host.as_ref());
            debug!("Captured prior host overrides: {:?}", prior);
            state.snapshot = Some(prior);
        }

        let server = local_network_parameters(&NetworkParameters::default(), port).server_string();
        self.host
            .set_override(OverrideKey::OneServer, toml::Value::Boolean(true));
        self.host
            .set_override(OverrideKey::SkipMerkleCheck, toml::Value::Boolean(true));
        self.host
            .set_override(OverrideKey::Server, toml::Value::String(server));
    }

    fn lock_state(&self) -> MutexGuard<'_, HandoffState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockHost;
    use crate::standalone::StandaloneHost;
    use mockall::predicate::eq;

    const GEN: Generation = Generation(1);

    fn standalone() -> Arc<StandaloneHost> {
        Arc::new(StandaloneHost::in_memory("mainnet"))
    }

    impl HandoffController {
        fn is_captured(&self) -> bool {
            self.lock_state().snapshot.is_some()
        }

        fn snapshot(&self) -> Option<PriorHostSettings> {
            self.lock_state().snapshot.clone()
        }

        /// Arm `GEN` and activate it
        fn prepare_and_activate(&self, port: u16) -> Result<bool> {
            self.prepare(GEN, port);
            self.activate(GEN, port)
        }
    }

    #[test]
    fn test_prepare_pins_overrides() {
        let host = standalone();
        let handoff = HandoffController::new(host.clone());

        handoff.prepare(GEN, 50123);

        assert_eq!(
            host.get_override(OverrideKey::OneServer),
            Some(toml::Value::Boolean(true))
        );
        assert_eq!(
            host.get_override(OverrideKey::SkipMerkleCheck),
            Some(toml::Value::Boolean(true))
        );
        assert_eq!(
            host.get_override(OverrideKey::Server),
            Some(toml::Value::from("127.0.0.1:50123:t"))
        );
        assert!(handoff.is_captured());
    }

    #[test]
    fn test_activate_switches_endpoint() {
        let host = standalone();
        let handoff = HandoffController::new(host.clone());

        assert!(handoff.prepare_and_activate(40404).unwrap());

        let params = host.network_parameters();
        assert_eq!(params.server_string(), "127.0.0.1:40404:t");
        assert_eq!(params.protocol, Protocol::Tcp);
        assert!(params.oneserver);
    }

    #[test]
    fn test_activate_keeps_unrelated_parameters() {
        let host = standalone();
        host.set_network_parameters(NetworkParameters {
            proxy: Some("socks5:localhost:9050".to_string()),
            ..Default::default()
        })
        .unwrap();
        let handoff = HandoffController::new(host.clone());

        handoff.prepare_and_activate(1).unwrap();
        assert_eq!(
            host.network_parameters().proxy.as_deref(),
            Some("socks5:localhost:9050")
        );
    }

    #[test]
    fn test_capture_happens_once_per_cycle() {
        let host = standalone();
        host.set_override(OverrideKey::Server, toml::Value::from("user:50002:s"));
        let handoff = HandoffController::new(host.clone());

        handoff.prepare(GEN, 1);
        handoff.prepare(Generation(2), 2);
        handoff.activate(Generation(2), 3).unwrap();

        // the snapshot holds the user's value, not our own earlier write
        let snapshot = handoff.snapshot().unwrap();
        assert_eq!(snapshot.server, Some(toml::Value::from("user:50002:s")));
        assert!(snapshot.oneserver.is_none());
    }

    #[test]
    fn test_restore_returns_prior_values() {
        let host = standalone();
        host.set_override(OverrideKey::OneServer, toml::Value::Boolean(false));
        host.set_override(OverrideKey::Server, toml::Value::from("user:50002:s"));
        let handoff = HandoffController::new(host.clone());

        handoff.prepare_and_activate(5).unwrap();
        assert!(handoff.restore());

        assert_eq!(
            host.get_override(OverrideKey::OneServer),
            Some(toml::Value::Boolean(false))
        );
        assert_eq!(
            host.get_override(OverrideKey::Server),
            Some(toml::Value::from("user:50002:s"))
        );
        // absent before, absent after
        assert!(host.get_override(OverrideKey::SkipMerkleCheck).is_none());
        assert!(!handoff.is_captured());
    }

    #[test]
    fn test_restore_without_capture_is_noop() {
        let mut host = MockHost::new();
        host.expect_set_override().never();
        host.expect_remove_override().never();
        let handoff = HandoffController::new(Arc::new(host));

        assert!(!handoff.restore());
    }

    #[test]
    fn test_next_cycle_captures_fresh_values() {
        let host = standalone();
        let handoff = HandoffController::new(host.clone());

        handoff.prepare(GEN, 1);
        handoff.restore();

        host.set_override(OverrideKey::Server, toml::Value::from("changed:1:t"));
        handoff.prepare(Generation(2), 2);
        assert_eq!(
            handoff.snapshot().unwrap().server,
            Some(toml::Value::from("changed:1:t"))
        );
    }

    #[test]
    fn test_restore_removes_previously_absent_keys() {
        let mut host = MockHost::new();
        host.expect_get_override().returning(|_| None);
        host.expect_set_override().times(3).return_const(());
        host.expect_remove_override()
            .with(eq(OverrideKey::OneServer))
            .times(1)
            .return_const(());
        host.expect_remove_override()
            .with(eq(OverrideKey::SkipMerkleCheck))
            .times(1)
            .return_const(());
        host.expect_remove_override()
            .with(eq(OverrideKey::Server))
            .times(1)
            .return_const(());

        let handoff = HandoffController::new(Arc::new(host));
        handoff.prepare(GEN, 7);
        assert!(handoff.restore());
    }

    #[test]
    fn test_activate_propagates_host_failure() {
        let mut host = MockHost::new();
        host.expect_get_override().returning(|_| None);
        host.expect_set_override().return_const(());
        host.expect_network_parameters()
            .returning(NetworkParameters::default);
        host.expect_set_network_parameters()
            .withf(|params| params.server_string() == "127.0.0.1:9:t" && params.oneserver)
            .times(1)
            .returning(|_| Err(Error::host("network thread gone")));

        let handoff = HandoffController::new(Arc::new(host));
        assert!(matches!(
            handoff.prepare_and_activate(9),
            Err(Error::Host { .. })
        ));
    }

    #[test]
    fn test_superseded_generation_does_not_activate() {
        let host = standalone();
        let handoff = HandoffController::new(host.clone());
        let before = host.network_parameters();

        handoff.prepare(GEN, 1);
        handoff.prepare(Generation(2), 2);

        assert!(!handoff.activate(GEN, 1).unwrap());
        assert_eq!(host.network_parameters(), before);
        assert_eq!(
            host.get_override(OverrideKey::Server),
            Some(toml::Value::from("127.0.0.1:2:t"))
        );
    }

    #[test]
    fn test_readiness_after_restore_leaves_host_alone() {
        let host = standalone();
        host.set_override(OverrideKey::Server, toml::Value::from("user:50002:s"));
        let handoff = HandoffController::new(host.clone());
        let before = host.network_parameters();

        handoff.prepare(GEN, 4);
        assert!(handoff.restore());

        // a reader that saw the launch as live before close() ran
        assert!(!handoff.activate(GEN, 4).unwrap());

        assert!(!handoff.is_captured());
        assert_eq!(host.network_parameters(), before);
        assert_eq!(
            host.get_override(OverrideKey::Server),
            Some(toml::Value::from("user:50002:s"))
        );
        assert!(host.get_override(OverrideKey::OneServer).is_none());
        assert!(host.get_override(OverrideKey::SkipMerkleCheck).is_none());
    }

    #[test]
    fn test_disarm_blocks_activation_but_keeps_snapshot() {
        let host = standalone();
        let handoff = HandoffController::new(host.clone());

        handoff.prepare(GEN, 6);
        handoff.disarm();

        assert!(!handoff.activate(GEN, 6).unwrap());
        assert!(handoff.is_captured());
        assert!(handoff.restore());
    }

    #[test]
    fn test_close_racing_readiness_always_ends_restored() {
        for _ in 0..50 {
            let host = standalone();
            let handoff = Arc::new(HandoffController::new(host.clone()));
            handoff.prepare(GEN, 8);

            let reader = {
                let handoff = Arc::clone(&handoff);
                std::thread::spawn(move || handoff.activate(GEN, 8).unwrap())
            };
            handoff.restore();
            reader.join().unwrap();

            // whichever ran first, nothing stays pinned
            assert!(host.get_override(OverrideKey::Server).is_none());
            assert!(host.get_override(OverrideKey::OneServer).is_none());
            assert!(!handoff.is_captured());
        }
    }
}
