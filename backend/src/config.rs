//! Environment configuration.
//!
//! [`Config::from_env`] loads `.env` (if any) and reads the variables below.
//! CLI flags override individual fields afterwards.
//!
//! | Variable                  | Default                  |
//! |---------------------------|--------------------------|
//! | `PAYOUT_STORE`            | `remote` if a REST URL is set, else `file` |
//! | `PAYOUT_STORE_PATH`       | `.payout/addresses.json` |
//! | `PAYOUT_REDIS_REST_URL`   |                          |
//! | `PAYOUT_REDIS_REST_TOKEN` |                          |
//! | `PAYOUT_NAMESPACE`        | `payout`                 |
//! | `DISCORD_TOKEN`           |                          |
//! | `PAYOUT_MEMBERS_FILE`     |                          |
//! | `PAYOUT_DONATION_ADDRESS` |                          |
//! | `RPC_URL_<chainId>`       | public endpoint          |
//! | `PAYOUT_SESSION_TTL_SECS` | `900`                    |
//! | `PORT`                    | `3008`                   |

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::chain::RpcTokenSource;
use crate::error::ConfigError;
use crate::identity::{AnyDirectory, DiscordDirectory, StaticDirectory};
use crate::ledger::{AnyStore, FileStore, MemoryStore, RemoteStore};
use crate::models::{checksum_address, parse_address, Donation, NETWORKS};

pub const DEFAULT_STORE_PATH: &str = ".payout/addresses.json";
pub const DEFAULT_NAMESPACE: &str = "payout";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 900;
pub const DEFAULT_PORT: u16 = 3008;

/// Ledger backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    File,
    Remote,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "file" => Ok(StoreKind::File),
            "remote" | "redis" => Ok(StoreKind::Remote),
            other => Err(ConfigError::Invalid {
                name: "PAYOUT_STORE",
                message: format!("expected memory, file or remote, got '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreKind,
    pub store_path: PathBuf,
    pub redis_url: Option<String>,
    pub redis_token: Option<String>,
    pub namespace: String,
    pub discord_token: Option<String>,
    pub members_file: Option<PathBuf>,
    /// EIP-55 donation destination, validated on load.
    pub donation_address: Option<String>,
    /// `RPC_URL_<chainId>` overrides.
    pub rpc_urls: BTreeMap<u64, String>,
    pub session_ttl: Duration,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreKind::File,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            redis_url: None,
            redis_token: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            discord_token: None,
            members_file: None,
            donation_address: None,
            rpc_urls: BTreeMap::new(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            port: DEFAULT_PORT,
        }
    }
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        message: e.to_string(),
    })
}

impl Config {
    /// Read configuration from the process environment and `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        config.redis_url = get("PAYOUT_REDIS_REST_URL");
        config.redis_token = get("PAYOUT_REDIS_REST_TOKEN");
        config.store = match get("PAYOUT_STORE") {
            Some(kind) => kind.parse()?,
            None if config.redis_url.is_some() => StoreKind::Remote,
            None => StoreKind::File,
        };
        if let Some(path) = get("PAYOUT_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(namespace) = get("PAYOUT_NAMESPACE") {
            config.namespace = namespace;
        }

        config.discord_token = get("DISCORD_TOKEN");
        config.members_file = get("PAYOUT_MEMBERS_FILE").map(PathBuf::from);

        if let Some(address) = get("PAYOUT_DONATION_ADDRESS") {
            let parsed = parse_address(&address).map_err(|e| ConfigError::Invalid {
                name: "PAYOUT_DONATION_ADDRESS",
                message: e.to_string(),
            })?;
            config.donation_address = Some(checksum_address(&parsed));
        }

        for network in NETWORKS {
            if let Some(url) = get(&format!("RPC_URL_{}", network.chain_id)) {
                config.rpc_urls.insert(network.chain_id, url);
            }
        }

        if let Some(secs) = get("PAYOUT_SESSION_TTL_SECS") {
            config.session_ttl = Duration::from_secs(parse_number("PAYOUT_SESSION_TTL_SECS", &secs)?);
        }
        if let Some(port) = get("PORT") {
            config.port = parse_number("PORT", &port)?;
        }

        Ok(config)
    }

    /// Open the configured ledger backend.
    pub fn open_store(&self) -> Result<AnyStore, ConfigError> {
        Ok(match self.store {
            StoreKind::Memory => AnyStore::Memory(MemoryStore::new()),
            StoreKind::File => AnyStore::File(FileStore::open(&self.store_path)?),
            StoreKind::Remote => {
                let url = self
                    .redis_url
                    .clone()
                    .ok_or(ConfigError::Missing("PAYOUT_REDIS_REST_URL"))?;
                AnyStore::Remote(RemoteStore::new(url, self.redis_token.clone(), self.namespace.clone()))
            }
        })
    }

    /// Discord when a bot token is set, else the members file, else an
    /// empty directory.
    pub fn open_directory(&self) -> Result<AnyDirectory, ConfigError> {
        if let Some(token) = &self.discord_token {
            return Ok(AnyDirectory::Discord(DiscordDirectory::new(token.clone())));
        }
        match &self.members_file {
            Some(path) => Ok(AnyDirectory::Static(StaticDirectory::from_file(path)?)),
            None => Ok(AnyDirectory::Static(StaticDirectory::new())),
        }
    }

    /// JSON-RPC token source with the configured endpoint overrides.
    pub fn token_source(&self) -> RpcTokenSource {
        self.rpc_urls
            .iter()
            .fold(RpcTokenSource::new(), |source, (chain_id, url)| {
                source.with_endpoint(*chain_id, url.clone())
            })
    }

    /// Donation of `amount` to the configured address, or to `address` when given.
    pub fn donation(&self, amount: Option<&str>, address: Option<&str>) -> Result<Option<Donation>, ConfigError> {
        let Some(amount) = amount.map(str::trim).filter(|a| !a.is_empty()) else {
            return Ok(None);
        };
        let address = address
            .map(str::to_string)
            .or_else(|| self.donation_address.clone())
            .ok_or(ConfigError::Missing("PAYOUT_DONATION_ADDRESS"))?;
        Ok(Some(Donation {
            address,
            amount: amount.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.store, StoreKind::File);
        assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(config.namespace, "payout");
        assert_eq!(config.session_ttl, Duration::from_secs(900));
        assert_eq!(config.port, 3008);
        assert!(config.donation_address.is_none());
        assert!(config.rpc_urls.is_empty());
    }

    #[test]
    fn test_remote_when_url_set() {
        let config = Config::from_lookup(lookup(&[
            ("PAYOUT_REDIS_REST_URL", "https://kv.example"),
            ("PAYOUT_REDIS_REST_TOKEN", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.store, StoreKind::Remote);
        assert_eq!(config.open_store().unwrap().kind(), "remote");
    }

    #[test]
    fn test_explicit_store_kind() {
        let config = Config::from_lookup(lookup(&[
            ("PAYOUT_STORE", "Memory"),
            ("PAYOUT_REDIS_REST_URL", "https://kv.example"),
        ]))
        .unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.open_store().unwrap().kind(), "memory");

        let err = Config::from_lookup(lookup(&[("PAYOUT_STORE", "sqlite")])).unwrap_err();
        assert!(err.to_string().contains("PAYOUT_STORE"));
    }

    #[test]
    fn test_remote_without_url() {
        let config = Config::from_lookup(lookup(&[("PAYOUT_STORE", "remote")])).unwrap();
        assert!(matches!(
            config.open_store(),
            Err(ConfigError::Missing("PAYOUT_REDIS_REST_URL"))
        ));
    }

    #[test]
    fn test_file_store_opens_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("addresses.json");
        let config = Config::from_lookup(lookup(&[("PAYOUT_STORE_PATH", path.to_str().unwrap())])).unwrap();
        assert_eq!(config.open_store().unwrap().kind(), "file");
    }

    #[test]
    fn test_numbers() {
        let config = Config::from_lookup(lookup(&[("PORT", "8080"), ("PAYOUT_SESSION_TTL_SECS", "60")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_ttl, Duration::from_secs(60));

        let err = Config::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_rpc_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("RPC_URL_137", "http://localhost:8545"),
            ("RPC_URL_5", "http://ignored"),
        ]))
        .unwrap();
        assert_eq!(config.rpc_urls.len(), 1);
        assert_eq!(config.token_source().endpoint(137), Some("http://localhost:8545"));
        assert_eq!(config.token_source().endpoint(1), Some("https://cloudflare-eth.com"));
    }

    #[test]
    fn test_donation() {
        let config = Config::from_lookup(lookup(&[(
            "PAYOUT_DONATION_ADDRESS",
            "0x116da30d890533516f2683731f9bd167807448b8",
        )]))
        .unwrap();
        assert_eq!(
            config.donation_address.as_deref(),
            Some("0x116Da30d890533516f2683731F9Bd167807448b8")
        );

        let donation = config.donation(Some("5"), None).unwrap().unwrap();
        assert_eq!(donation.amount, "5");
        assert_eq!(donation.address, "0x116Da30d890533516f2683731F9Bd167807448b8");
        assert!(config.donation(None, None).unwrap().is_none());
        assert!(config.donation(Some(" "), None).unwrap().is_none());

        let bare = Config::default();
        assert!(matches!(bare.donation(Some("5"), None), Err(ConfigError::Missing(_))));
        let explicit = bare.donation(Some("5"), Some("0xabc")).unwrap().unwrap();
        assert_eq!(explicit.address, "0xabc");
    }

    #[test]
    fn test_invalid_donation_address() {
        let err = Config::from_lookup(lookup(&[("PAYOUT_DONATION_ADDRESS", "nope")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PAYOUT_DONATION_ADDRESS", .. }));
    }

    #[test]
    fn test_directory_selection() {
        let config = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "bot")])).unwrap();
        assert!(matches!(config.open_directory().unwrap(), AnyDirectory::Discord(_)));

        let config = Config::default();
        assert!(matches!(config.open_directory().unwrap(), AnyDirectory::Static(_)));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("members.json");
        let config = Config::from_lookup(lookup(&[("PAYOUT_MEMBERS_FILE", missing.to_str().unwrap())])).unwrap();
        assert!(matches!(config.open_directory(), Err(ConfigError::Directory(_))));
    }
}
