//! A minimal [`Host`] for running the supervisor outside a wallet application
//!
//! Used by the headless runner and the `config` subcommands. Persisted
//! settings live in a [`SettingsStore`]; overrides live in an
//! [`OverrideLayer`] and shadow persisted values of the same name.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bwtctl_core::prelude::*;

use crate::config::SettingsStore;
use crate::host::{Host, NetworkParameters, OverrideKey};
use crate::overrides::OverrideLayer;

pub struct StandaloneHost {
    chain: String,
    network: Mutex<NetworkParameters>,
    overrides: OverrideLayer,
    settings: Mutex<toml::Table>,
    store: Option<SettingsStore>,
}

impl StandaloneHost {
    /// Host backed by a settings file
    pub fn new(chain: impl Into<String>, store: SettingsStore) -> Result<Self> {
        let settings = store.load()?;
        let host = Self::with_table(chain.into(), settings, Some(store));
        Ok(host)
    }

    /// Host whose settings are never written anywhere
    pub fn in_memory(chain: impl Into<String>) -> Self {
        Self::with_table(chain.into(), toml::Table::new(), None)
    }

    fn with_table(chain: String, settings: toml::Table, store: Option<SettingsStore>) -> Self {
        let host = Self {
            chain,
            network: Mutex::new(NetworkParameters::default()),
            overrides: OverrideLayer::new(),
            settings: Mutex::new(settings),
            store,
        };
        host.refresh_network_from_settings();
        host
    }

    /// Initial endpoint from the persisted `server`/`oneserver` settings
    fn refresh_network_from_settings(&self) {
        let mut params = NetworkParameters::default();
        if let Some(toml::Value::String(server)) = self.effective_value(OverrideKey::Server.as_str())
        {
            match params.with_server(&server) {
                Ok(parsed) => params = parsed,
                Err(e) => warn!("Ignoring persisted server setting: {}", e),
            }
        }
        if let Some(toml::Value::Boolean(oneserver)) =
            self.effective_value(OverrideKey::OneServer.as_str())
        {
            params.oneserver = oneserver;
        }
        *lock(&self.network) = params;
    }

    /// Value of `name` as the host application would see it: the override
    /// layer first, then the persisted settings
    pub fn effective_value(&self, name: &str) -> Option<toml::Value> {
        if let Ok(key) = name.parse::<OverrideKey>() {
            if let Some(value) = self.overrides.get(key) {
                return Some(value);
            }
        }
        lock(&self.settings).get(name).cloned()
    }

    pub fn overrides(&self) -> &OverrideLayer {
        &self.overrides
    }

    /// Copy of the persisted settings
    pub fn settings(&self) -> toml::Table {
        lock(&self.settings).clone()
    }

    pub fn store(&self) -> Option<&SettingsStore> {
        self.store.as_ref()
    }
}

impl Host for StandaloneHost {
    fn chain_identity(&self) -> String {
        self.chain.clone()
    }

    fn network_parameters(&self) -> NetworkParameters {
        lock(&self.network).clone()
    }

    fn set_network_parameters(&self, params: NetworkParameters) -> Result<()> {
        info!("Network endpoint set to {}", params);
        *lock(&self.network) = params;
        Ok(())
    }

    fn get_override(&self, key: OverrideKey) -> Option<toml::Value> {
        self.overrides.get(key)
    }

    fn set_override(&self, key: OverrideKey, value: toml::Value) {
        debug!("Override {} = {}", key, value);
        self.overrides.set(key, value);
    }

    fn remove_override(&self, key: OverrideKey) {
        debug!("Override {} removed", key);
        self.overrides.remove(key);
    }

    fn get_setting(&self, key: &str) -> Option<toml::Value> {
        lock(&self.settings).get(key).cloned()
    }

    fn set_setting(&self, key: &str, value: toml::Value) -> Result<()> {
        let mut settings = lock(&self.settings);
        settings.insert(key.to_string(), value);
        if let Some(store) = &self.store {
            store.save(&settings)?;
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
