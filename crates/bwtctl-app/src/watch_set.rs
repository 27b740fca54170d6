//! The set of wallets the daemon tracks

use std::collections::BTreeMap;

use bwtctl_core::prelude::*;
use bwtctl_daemon::{WalletKeys, WatchedWallet};

use crate::host::{WalletInfo, WalletKind};

/// Wallets registered with the supervisor, keyed by wallet id.
///
/// Iteration order is the id order, so the daemon command line does not
/// depend on registration order.
#[derive(Debug, Default)]
pub struct WatchSet {
    wallets: BTreeMap<String, WatchedWallet>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a host wallet against the watch-only policy and extract its keys
    pub fn admit(wallet: &WalletInfo) -> Result<WatchedWallet> {
        if !wallet.watch_only {
            return Err(Error::unsupported_wallet(
                &wallet.id,
                "only watch-only wallets are supported",
            ));
        }

        if wallet.master_public_keys.is_empty() {
            return Err(Error::unsupported_wallet(
                &wallet.id,
                "no exportable master public keys",
            ));
        }

        let keys = match wallet.kind {
            WalletKind::Standard => match wallet.master_public_keys.as_slice() {
                [xpub] => WalletKeys::Single { xpub: xpub.clone() },
                keys => {
                    return Err(Error::unsupported_wallet(
                        &wallet.id,
                        format!("expected one master public key, found {}", keys.len()),
                    ))
                }
            },
            WalletKind::Multisig { threshold } => {
                let Some(script_type) = &wallet.script_type else {
                    return Err(Error::unsupported_wallet(
                        &wallet.id,
                        "multisig wallet without a script type",
                    ));
                };
                WalletKeys::Multisig {
                    threshold,
                    script_type: script_type.clone(),
                    xpubs: wallet.master_public_keys.clone(),
                }
            }
        };

        Ok(WatchedWallet {
            id: wallet.id.clone(),
            keys,
        })
    }

    /// Add or replace a wallet. Returns true if the set changed.
    pub fn insert(&mut self, wallet: WatchedWallet) -> bool {
        match self.wallets.get(&wallet.id) {
            Some(existing) if *existing == wallet => false,
            _ => {
                self.wallets.insert(wallet.id.clone(), wallet);
                true
            }
        }
    }

    /// Returns true if the wallet was present
    pub fn remove(&mut self, id: &str) -> bool {
        self.wallets.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Current wallets in id order
    pub fn wallets(&self) -> Vec<WatchedWallet> {
        self.wallets.values().cloned().collect()
    }
}
