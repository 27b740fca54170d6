//! Wallet lifecycle callbacks invoked by the host.
//!
//! The host holds exactly one implementor and calls these hooks as wallets
//! are opened and closed. [`Supervisor`] is the implementation shipped here.

use bwtctl_core::prelude::*;

use crate::host::WalletInfo;
use crate::supervisor::Supervisor;

/// Events the host delivers to the plugin
pub trait WalletEvents {
    /// A wallet was opened in the host
    fn on_wallet_added(&mut self, wallet: &WalletInfo) -> Result<()>;

    /// A wallet was closed in the host
    fn on_wallet_removed(&mut self, wallet_id: &str) -> Result<()> {
        let _ = wallet_id;
        Ok(())
    }

    /// The plugin is being disabled or the host is shutting down
    fn on_close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl WalletEvents for Supervisor {
    fn on_wallet_added(&mut self, wallet: &WalletInfo) -> Result<()> {
        self.register(wallet)
    }

    fn on_wallet_removed(&mut self, wallet_id: &str) -> Result<()> {
        self.unregister(wallet_id);
        Ok(())
    }

    fn on_close(&mut self) -> Result<()> {
        self.close();
        Ok(())
    }
}
