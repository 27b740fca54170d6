//! bwtctl - supervise a bwt daemon for a wallet host
//!
//! The binary wraps the workspace crates in two entry points: a headless
//! runner that emulates the host from a wallets file, and the `config`
//! subcommands that edit the persisted settings.

pub mod cli;
pub mod headless;

pub use headless::runner::{run_headless, HeadlessOptions};
