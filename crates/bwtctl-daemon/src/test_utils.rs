//! Test utilities for key material and daemon stand-ins
//!
//! The three constants below are the same BIP-32 key in its p2pkh (`xpub`),
//! p2sh-p2wpkh (`ypub`) and p2wpkh (`zpub`) serializations.

use miniscript::bitcoin::base58;
use miniscript::bitcoin::bip32::{ChildNumber, Xpub};
use miniscript::bitcoin::secp256k1::Secp256k1;

use crate::xpub::TPUB_VERSION;

/// Canonical mainnet test key
pub const TEST_XPUB: &str = "xpub661MyMwAqRbcFLqTBCNzuoj4FYE1xRxmCjrSWC6LUjKHo46Du4NacKgxdrJPWhzLjkPsXqnjAUwn1raMSWfxWZKysPoBNQMZMs8b5JM8egC";

/// [`TEST_XPUB`] with `ypub` version bytes
pub const TEST_YPUB: &str = "ypub6QqdH2c5z7966e2a1ZAd7tpZRWNTu3xG7rNfHazDrjhAr9uT9iY9EPM6f4FyWceG9PWgHKPHd9JKu9BvAD5yJo1ajjVbxKB3dbCETvZ3Jzw";

/// [`TEST_XPUB`] with `zpub` version bytes
pub const TEST_ZPUB: &str = "zpub6jftahH18ngZwwDgquxFKyv4bUWuqfwm2xtt4yt7Ek53uFigQNhhrT1EgGDZWXJBZ2dV2nyr5oesnRoUsuVz72hBc5C2YDzXuKFsrTu7JHp";

/// Re-encode a key with different version bytes.
///
/// # Panics
/// If `key` is not a valid base58check extended key.
pub fn reversion(key: &str, version: [u8; 4]) -> String {
    let mut data = base58::decode_check(key).expect("valid test key");
    data[0..4].copy_from_slice(&version);
    base58::encode_check(&data)
}

/// Derive a distinct, valid mainnet xpub from [`TEST_XPUB`].
///
/// Used to build multisig fixtures with several cosigners.
pub fn derived_xpub(index: u32) -> String {
    let secp = Secp256k1::verification_only();
    let master: Xpub = TEST_XPUB.parse().expect("valid test key");
    let child = ChildNumber::from_normal_idx(index).expect("normal index");
    master
        .ckd_pub(&secp, child)
        .expect("derivation succeeds")
        .to_string()
}

/// [`TEST_XPUB`] with testnet (`tpub`) version bytes, valid on testnet and regtest
pub fn test_tpub() -> String {
    reversion(TEST_XPUB, TPUB_VERSION)
}

/// [`derived_xpub`] with testnet version bytes
pub fn derived_tpub(index: u32) -> String {
    reversion(&derived_xpub(index), TPUB_VERSION)
}

/// Write an executable shell script that stands in for the daemon binary.
///
/// The script body receives the daemon arguments as `$@`.
#[cfg(unix)]
pub fn fake_daemon_script(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("bwt");
    {
        let mut file = std::fs::File::create(&path).expect("create fake daemon");
        writeln!(file, "#!/bin/sh").expect("write shebang");
        writeln!(file, "{}", body).expect("write body");
        file.sync_all().expect("sync fake daemon");
    }
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod fake daemon");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversion_round_trips_to_slip132() {
        assert_eq!(reversion(TEST_XPUB, [0x04, 0xB2, 0x47, 0x46]), TEST_ZPUB);
        assert_eq!(reversion(TEST_XPUB, [0x04, 0x9D, 0x7C, 0xB2]), TEST_YPUB);
    }

    #[test]
    fn test_derived_xpubs_are_distinct() {
        let a = derived_xpub(0);
        let b = derived_xpub(1);
        assert!(a.starts_with("xpub"));
        assert_ne!(a, b);
        assert_ne!(a, TEST_XPUB);
    }

    #[test]
    fn test_tpub_fixtures_are_accepted_on_test_chains() {
        use crate::xpub::canonicalize_xpub;
        use bwtctl_core::Network;

        let tpub = test_tpub();
        assert!(tpub.starts_with("tpub"));
        assert_eq!(canonicalize_xpub(&tpub, Network::Regtest).unwrap(), tpub);
        assert_eq!(canonicalize_xpub(&tpub, Network::Testnet).unwrap(), tpub);
        assert!(canonicalize_xpub(&tpub, Network::Bitcoin).is_err());

        let derived = derived_tpub(1);
        assert!(derived.starts_with("tpub"));
        assert_ne!(derived, tpub);
        assert!(canonicalize_xpub(&derived, Network::Regtest).is_ok());
    }
}
