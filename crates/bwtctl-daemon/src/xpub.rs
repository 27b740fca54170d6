//! Extended public key canonicalization
//!
//! Wallet applications serialize extended public keys with SLIP-132 version
//! bytes (`ypub`, `zpub`, `Zpub`, ...) that encode the script type. The
//! daemon only accepts plain BIP-32 `xpub`/`tpub` keys, so every key is
//! rewritten to the canonical version bytes of its chain before it is put on
//! the command line.

use miniscript::bitcoin::base58;
use miniscript::bitcoin::bip32::Xpub;

use bwtctl_core::prelude::*;
use bwtctl_core::Network;

/// Length of a serialized BIP-32 extended key (without checksum)
const EXTENDED_KEY_LEN: usize = 78;

/// Canonical `xpub` version bytes (mainnet)
pub const XPUB_VERSION: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];

/// Canonical `tpub` version bytes (testnet, regtest)
pub const TPUB_VERSION: [u8; 4] = [0x04, 0x35, 0x87, 0xCF];

/// Which chain family a version prefix belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyChain {
    Main,
    Test,
}

/// Known public key version prefixes.
const KNOWN_VERSIONS: &[([u8; 4], KeyChain, &str)] = &[
    ([0x04, 0x88, 0xB2, 0x1E], KeyChain::Main, "xpub"),
    ([0x04, 0x9D, 0x7C, 0xB2], KeyChain::Main, "ypub"),
    ([0x04, 0xB2, 0x47, 0x46], KeyChain::Main, "zpub"),
    ([0x02, 0x95, 0xB4, 0x3F], KeyChain::Main, "Ypub"),
    ([0x02, 0xAA, 0x7E, 0xD3], KeyChain::Main, "Zpub"),
    ([0x04, 0x35, 0x87, 0xCF], KeyChain::Test, "tpub"),
    ([0x04, 0x4A, 0x52, 0x62], KeyChain::Test, "upub"),
    ([0x04, 0x5F, 0x1C, 0xF6], KeyChain::Test, "vpub"),
    ([0x02, 0x42, 0x89, 0xEF], KeyChain::Test, "Upub"),
    ([0x02, 0x57, 0x54, 0x83], KeyChain::Test, "Vpub"),
];

impl KeyChain {
    fn for_network(network: Network) -> Self {
        match network {
            Network::Bitcoin => KeyChain::Main,
            Network::Testnet | Network::Regtest => KeyChain::Test,
        }
    }

    fn canonical_version(&self) -> [u8; 4] {
        match self {
            KeyChain::Main => XPUB_VERSION,
            KeyChain::Test => TPUB_VERSION,
        }
    }
}

/// Rewrite an extended public key into the canonical form for `network`.
///
/// Fails when the key is not valid base58check, has an unknown version,
/// belongs to another chain, or does not decode as a BIP-32 public key.
pub fn canonicalize_xpub(key: &str, network: Network) -> Result<String> {
    let key = key.trim();
    let mut data = base58::decode_check(key)
        .map_err(|e| Error::invalid_key(format!("{}: {}", abbreviate(key), e)))?;

    if data.len() != EXTENDED_KEY_LEN {
        return Err(Error::invalid_key(format!(
            "{}: expected {} bytes, got {}",
            abbreviate(key),
            EXTENDED_KEY_LEN,
            data.len()
        )));
    }

    let (chain, prefix) = KNOWN_VERSIONS
        .iter()
        .find(|(version, _, _)| data[0..4] == version[..])
        .map(|(_, chain, prefix)| (*chain, *prefix))
        .ok_or_else(|| {
            Error::invalid_key(format!(
                "{}: unknown version bytes {:02x?}",
                abbreviate(key),
                &data[0..4]
            ))
        })?;

    let expected = KeyChain::for_network(network);
    if chain != expected {
        return Err(Error::invalid_key(format!(
            "{} key {} does not belong to {}",
            prefix,
            abbreviate(key),
            network
        )));
    }

    data[0..4].copy_from_slice(&expected.canonical_version());

    let xpub = Xpub::decode(&data)
        .map_err(|e| Error::invalid_key(format!("{}: {}", abbreviate(key), e)))?;

    if prefix != "xpub" && prefix != "tpub" {
        trace!("Converted {} key to canonical form", prefix);
    }

    Ok(xpub.to_string())
}

/// Shorten a key for log and error messages
fn abbreviate(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 16 {
        key.to_string()
    } else {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}
