//! Daemon command line construction
//!
//! [`DaemonConfig`] is the immutable snapshot of everything one launch of the
//! daemon needs. It is rebuilt from the current watch-set and settings on
//! every (re)start and never mutated afterwards.

use std::path::{Path, PathBuf};

use bwtctl_core::prelude::*;
use bwtctl_core::{MultisigScriptType, Network, RescanPolicy};

use crate::port::local_rpc_addr;
use crate::xpub::canonicalize_xpub;

/// Key material a host wallet exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletKeys {
    /// A single-key HD wallet
    Single { xpub: String },
    /// An m-of-n multisig wallet; `script_type` is the host's tag
    Multisig {
        threshold: usize,
        script_type: String,
        xpubs: Vec<String>,
    },
}

/// A wallet as seen by the argument builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedWallet {
    pub id: String,
    pub keys: WalletKeys,
}

/// One key-material argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// `--xpub <key>`
    Xpub(String),
    /// `--descriptor <desc>`
    Descriptor(String),
}

impl KeyMaterial {
    fn push_args(&self, args: &mut Vec<String>) {
        match self {
            KeyMaterial::Xpub(key) => {
                args.push("--xpub".to_string());
                args.push(key.clone());
            }
            KeyMaterial::Descriptor(desc) => {
                args.push("--descriptor".to_string());
                args.push(desc.clone());
            }
        }
    }
}

/// User-facing launch options, taken from the plugin settings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchOptions {
    pub bitcoind_url: String,
    pub bitcoind_dir: PathBuf,
    pub bitcoind_auth: Option<String>,
    pub bitcoind_wallet: Option<String>,
    pub rescan: RescanPolicy,
    /// Unix socket for sync notifications (only passed on Linux)
    pub socket_path: Option<PathBuf>,
    /// Number of `-v` flags
    pub verbosity: u8,
    /// Free-form options, split on whitespace. Quoting is not supported.
    pub extra_args: String,
}

/// Immutable per-launch daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    network: Network,
    bitcoind_url: String,
    bitcoind_dir: PathBuf,
    bitcoind_auth: Option<String>,
    bitcoind_wallet: Option<String>,
    rescan: RescanPolicy,
    port: u16,
    socket_path: Option<PathBuf>,
    verbosity: u8,
    extra_args: Vec<String>,
    keys: Vec<KeyMaterial>,
}

impl DaemonConfig {
    /// Build the snapshot for one launch.
    ///
    /// An unrecognized `chain_identity` fails the whole build. A wallet whose
    /// keys cannot be used is skipped with a warning; the others still go in.
    pub fn build(
        chain_identity: &str,
        wallets: &[WatchedWallet],
        options: &LaunchOptions,
        port: u16,
    ) -> Result<Self> {
        let network = Network::from_chain_identity(chain_identity)?;

        let mut keys = Vec::new();
        for wallet in wallets {
            match wallet_key_material(&wallet.keys, network) {
                Ok(material) => keys.extend(material),
                Err(e) => warn!("Skipping wallet {}: {}", wallet.id, e),
            }
        }

        Ok(Self {
            network,
            bitcoind_url: options.bitcoind_url.clone(),
            bitcoind_dir: options.bitcoind_dir.clone(),
            bitcoind_auth: non_empty(options.bitcoind_auth.as_deref()),
            bitcoind_wallet: non_empty(options.bitcoind_wallet.as_deref()),
            rescan: options.rescan,
            port,
            socket_path: options
                .socket_path
                .clone()
                .filter(|_| cfg!(target_os = "linux")),
            verbosity: options.verbosity,
            extra_args: options
                .extra_args
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            keys,
        })
    }

    /// Ordered argument list for the daemon invocation
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--network".to_string(),
            self.network.as_arg().to_string(),
            "--bitcoind-url".to_string(),
            self.bitcoind_url.clone(),
            "--bitcoind-dir".to_string(),
            self.bitcoind_dir.display().to_string(),
        ];

        if let Some(auth) = &self.bitcoind_auth {
            args.push("--bitcoind-auth".to_string());
            args.push(auth.clone());
        }

        if let Some(wallet) = &self.bitcoind_wallet {
            args.push("--bitcoind-wallet".to_string());
            args.push(wallet.clone());
        }

        args.push("--rescan-since".to_string());
        args.push(self.rescan.as_arg());

        args.push("--electrum-addr".to_string());
        args.push(local_rpc_addr(self.port).to_string());
        args.push("--electrum-skip-merkle".to_string());
        args.push("--no-startup-banner".to_string());

        if let Some(path) = &self.socket_path {
            args.push("--unix-listener-path".to_string());
            args.push(path.display().to_string());
        }

        for key in &self.keys {
            key.push_args(&mut args);
        }

        for _ in 0..self.verbosity {
            args.push("-v".to_string());
        }

        args.extend(self.extra_args.iter().cloned());

        args
    }

    /// Same as [`to_args`](Self::to_args) with the RPC credential masked, for logging
    pub fn to_redacted_args(&self) -> Vec<String> {
        let mut args = self.to_args();
        if let Some(pos) = args.iter().position(|a| a == "--bitcoind-auth") {
            if let Some(value) = args.get_mut(pos + 1) {
                *value = "<redacted>".to_string();
            }
        }
        args
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn keys(&self) -> &[KeyMaterial] {
        &self.keys
    }

    /// Whether at least one wallet contributed key material
    pub fn has_key_material(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_path.as_deref()
    }
}

/// Key-material arguments for one wallet
pub fn wallet_key_material(keys: &WalletKeys, network: Network) -> Result<Vec<KeyMaterial>> {
    match keys {
        WalletKeys::Single { xpub } => Ok(vec![KeyMaterial::Xpub(canonicalize_xpub(
            xpub, network,
        )?)]),
        WalletKeys::Multisig {
            threshold,
            script_type,
            xpubs,
        } => {
            let script_type = MultisigScriptType::from_tag(script_type)?;
            let [receive, change] = multisig_descriptors(*threshold, script_type, xpubs, network)?;
            Ok(vec![
                KeyMaterial::Descriptor(receive),
                KeyMaterial::Descriptor(change),
            ])
        }
    }
}

/// Receive (index 0) and change (index 1) descriptors for an m-of-n wallet
pub fn multisig_descriptors(
    threshold: usize,
    script_type: MultisigScriptType,
    xpubs: &[String],
    network: Network,
) -> Result<[String; 2]> {
    if threshold == 0 || threshold > xpubs.len() {
        return Err(Error::unsupported_wallet(
            format!("{}-of-{}", threshold, xpubs.len()),
            "threshold must be between 1 and the number of cosigners",
        ));
    }

    let canonical = xpubs
        .iter()
        .map(|key| canonicalize_xpub(key, network))
        .collect::<Result<Vec<_>>>()?;

    let descriptor = |chain: u32| {
        let keys = canonical
            .iter()
            .map(|key| format!("{}/{}/*", key, chain))
            .collect::<Vec<_>>()
            .join(",");
        script_type.wrap(&format!("sortedmulti({},{})", threshold, keys))
    };

    Ok([descriptor(0), descriptor(1)])
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{derived_xpub, TEST_XPUB, TEST_YPUB, TEST_ZPUB};

    fn options() -> LaunchOptions {
        LaunchOptions {
            bitcoind_url: "http://localhost:8332/".to_string(),
            bitcoind_dir: PathBuf::from("/home/user/.bitcoin"),
            ..Default::default()
        }
    }

    fn single(id: &str, xpub: &str) -> WatchedWallet {
        WatchedWallet {
            id: id.to_string(),
            keys: WalletKeys::Single {
                xpub: xpub.to_string(),
            },
        }
    }

    fn multisig(id: &str, threshold: usize, script_type: &str, xpubs: Vec<String>) -> WatchedWallet {
        WatchedWallet {
            id: id.to_string(),
            keys: WalletKeys::Multisig {
                threshold,
                script_type: script_type.to_string(),
                xpubs,
            },
        }
    }

    fn values_of<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
        args.windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn test_minimal_argument_order() {
        let config = DaemonConfig::build("mainnet", &[single("a", TEST_XPUB)], &options(), 50001)
            .unwrap();
        let args = config.to_args();

        let expected: Vec<String> = [
            "--network",
            "bitcoin",
            "--bitcoind-url",
            "http://localhost:8332/",
            "--bitcoind-dir",
            "/home/user/.bitcoin",
            "--rescan-since",
            "all",
            "--electrum-addr",
            "127.0.0.1:50001",
            "--electrum-skip-merkle",
            "--no-startup-banner",
            "--xpub",
            TEST_XPUB,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_one_canonical_xpub_per_single_key_wallet() {
        let wallets = vec![
            single("x", TEST_XPUB),
            single("y", TEST_YPUB),
            single("z", TEST_ZPUB),
        ];
        let config = DaemonConfig::build("mainnet", &wallets, &options(), 1).unwrap();
        let args = config.to_args();

        let xpubs = values_of(&args, "--xpub");
        assert_eq!(xpubs, vec![TEST_XPUB, TEST_XPUB, TEST_XPUB]);
        assert!(values_of(&args, "--descriptor").is_empty());
    }

    #[test]
    fn test_multisig_emits_receive_and_change_descriptors() {
        let cosigners = vec![derived_xpub(0), derived_xpub(1), derived_xpub(2)];
        let wallets = vec![multisig("ms", 2, "p2wsh", cosigners.clone())];
        let config = DaemonConfig::build("mainnet", &wallets, &options(), 1).unwrap();
        let args = config.to_args();

        let descriptors = values_of(&args, "--descriptor");
        assert_eq!(descriptors.len(), 2);
        assert!(descriptors[0].starts_with("wsh(sortedmulti(2,"));
        for (index, desc) in descriptors.iter().enumerate() {
            for key in &cosigners {
                assert!(
                    desc.contains(&format!("{}/{}/*", key, index)),
                    "{} missing {}",
                    desc,
                    key
                );
            }
        }
        assert!(values_of(&args, "--xpub").is_empty());
    }

    #[test]
    fn test_multisig_wrapping_by_script_type() {
        let keys = vec![derived_xpub(0), derived_xpub(1)];
        let [p2sh, _] =
            multisig_descriptors(1, MultisigScriptType::P2sh, &keys, Network::Bitcoin).unwrap();
        let [nested, _] =
            multisig_descriptors(1, MultisigScriptType::P2wshP2sh, &keys, Network::Bitcoin)
                .unwrap();

        assert_eq!(
            p2sh,
            format!("sh(sortedmulti(1,{}/0/*,{}/0/*))", keys[0], keys[1])
        );
        assert_eq!(
            nested,
            format!("sh(wsh(sortedmulti(1,{}/0/*,{}/0/*)))", keys[0], keys[1])
        );
    }

    #[test]
    fn test_multisig_member_keys_are_canonicalized() {
        let keys = vec![TEST_ZPUB.to_string(), derived_xpub(5)];
        let [receive, change] =
            multisig_descriptors(2, MultisigScriptType::P2wsh, &keys, Network::Bitcoin).unwrap();
        assert!(receive.contains(&format!("{}/0/*", TEST_XPUB)));
        assert!(change.contains(&format!("{}/1/*", TEST_XPUB)));
        assert!(!receive.contains("zpub"));
    }

    #[test]
    fn test_unknown_script_type_skips_only_that_wallet() {
        let wallets = vec![
            multisig("taproot", 1, "p2tr", vec![derived_xpub(0)]),
            single("ok", TEST_XPUB),
        ];
        let config = DaemonConfig::build("mainnet", &wallets, &options(), 1).unwrap();
        assert_eq!(config.keys(), &[KeyMaterial::Xpub(TEST_XPUB.to_string())]);
    }

    #[test]
    fn test_invalid_key_skips_only_that_wallet() {
        let wallets = vec![single("bad", "xpubGARBAGE"), single("good", TEST_YPUB)];
        let config = DaemonConfig::build("mainnet", &wallets, &options(), 1).unwrap();
        assert_eq!(config.keys().len(), 1);
        assert!(config.has_key_material());
    }

    #[test]
    fn test_bad_threshold_skips_wallet() {
        let wallets = vec![multisig("ms", 3, "p2wsh", vec![derived_xpub(0), derived_xpub(1)])];
        let config = DaemonConfig::build("mainnet", &wallets, &options(), 1).unwrap();
        assert!(!config.has_key_material());
    }

    #[test]
    fn test_unsupported_chain_is_fatal() {
        let err = DaemonConfig::build("signet", &[single("a", TEST_XPUB)], &options(), 1)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedNetwork { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_optional_backend_flags() {
        let opts = LaunchOptions {
            bitcoind_auth: Some("user:pass".to_string()),
            bitcoind_wallet: Some("watch".to_string()),
            rescan: "2021-03-04".parse().unwrap(),
            ..options()
        };
        let config = DaemonConfig::build("mainnet", &[single("a", TEST_XPUB)], &opts, 1).unwrap();
        let args = config.to_args();

        assert_eq!(values_of(&args, "--bitcoind-auth"), vec!["user:pass"]);
        assert_eq!(values_of(&args, "--bitcoind-wallet"), vec!["watch"]);
        assert_eq!(values_of(&args, "--rescan-since"), vec!["2021-03-04"]);

        let redacted = config.to_redacted_args();
        assert_eq!(values_of(&redacted, "--bitcoind-auth"), vec!["<redacted>"]);
    }

    #[test]
    fn test_blank_optional_values_are_omitted() {
        let opts = LaunchOptions {
            bitcoind_auth: Some("   ".to_string()),
            bitcoind_wallet: Some(String::new()),
            ..options()
        };
        let config = DaemonConfig::build("mainnet", &[single("a", TEST_XPUB)], &opts, 1).unwrap();
        let args = config.to_args();
        assert!(!args.iter().any(|a| a == "--bitcoind-auth"));
        assert!(!args.iter().any(|a| a == "--bitcoind-wallet"));
    }

    #[test]
    fn test_verbosity_and_extra_args_trail() {
        let opts = LaunchOptions {
            verbosity: 3,
            extra_args: "  --gap-limit 50   --poll-interval 1 ".to_string(),
            ..options()
        };
        let config = DaemonConfig::build("mainnet", &[single("a", TEST_XPUB)], &opts, 1).unwrap();
        let args = config.to_args();

        let tail: Vec<&str> = args[args.len() - 7..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec!["-v", "-v", "-v", "--gap-limit", "50", "--poll-interval", "1"]
        );
    }

    #[test]
    fn test_regtest_network_flag() {
        let tpub = crate::test_utils::reversion(TEST_XPUB, crate::xpub::TPUB_VERSION);
        let config = DaemonConfig::build("regtest", &[single("a", &tpub)], &options(), 1).unwrap();
        let args = config.to_args();
        assert_eq!(values_of(&args, "--network"), vec!["regtest"]);
        assert_eq!(values_of(&args, "--xpub"), vec![tpub.as_str()]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unix_listener_path_on_linux() {
        let opts = LaunchOptions {
            socket_path: Some(PathBuf::from("/tmp/bwt-socket")),
            ..options()
        };
        let config = DaemonConfig::build("mainnet", &[single("a", TEST_XPUB)], &opts, 1).unwrap();
        assert_eq!(
            values_of(&config.to_args(), "--unix-listener-path"),
            vec!["/tmp/bwt-socket"]
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let wallets = vec![single("a", TEST_XPUB), single("b", TEST_ZPUB)];
        let a = DaemonConfig::build("mainnet", &wallets, &options(), 7).unwrap();
        let b = DaemonConfig::build("mainnet", &wallets, &options(), 7).unwrap();
        assert_eq!(a.to_args(), b.to_args());
    }
}
