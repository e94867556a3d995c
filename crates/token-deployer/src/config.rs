//! Project configuration file: compiler version, networks and block explorer
//! settings.
//!
//! ```toml
//! solidity = "0.8.24"
//!
//! [networks.sepolia]
//! url = "https://rpc.sepolia.org"
//! chain-id = 11155111
//! accounts = ["0x..."]
//! confirmations = 2
//!
//! [etherscan]
//! api-key = "..."
//! browser-url = "https://sepolia.etherscan.io"
//! ```

use {
    anyhow::{Context, Result, anyhow},
    serde::Deserialize,
    std::{
        collections::BTreeMap,
        fmt::{self, Debug, Formatter},
        path::Path,
    },
    tokio::fs,
    url::Url,
};

pub const DEFAULT_SOLIDITY_VERSION: &str = "0.8.24";
pub const DEFAULT_NETWORK: &str = "localhost";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    solidity: Solidity,

    #[serde(default = "default_networks")]
    pub networks: BTreeMap<String, Network>,

    #[serde(default)]
    pub etherscan: Etherscan,
}

impl Config {
    /// Version of the compiler the artifacts are expected to be built with.
    pub fn solidity_version(&self) -> &str {
        match &self.solidity {
            Solidity::Version(version) => version,
            Solidity::Settings { version } => version,
        }
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks.get(name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solidity: Solidity::default(),
            networks: default_networks(),
            etherscan: Etherscan::default(),
        }
    }
}

/// Either `solidity = "0.8.24"` or a `[solidity]` table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Solidity {
    Version(String),
    Settings { version: String },
}

impl Default for Solidity {
    fn default() -> Self {
        Self::Version(DEFAULT_SOLIDITY_VERSION.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Network {
    pub url: Url,

    /// Expected chain ID. The deployment is aborted if the node reports a
    /// different one.
    pub chain_id: Option<u64>,

    /// Private keys of the accounts to deploy from. The first one is used.
    #[serde(default)]
    pub accounts: Vec<PrivateKey>,

    /// Number of blocks to wait for after the deployment transaction got
    /// mined.
    pub confirmations: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Etherscan {
    pub api_key: Option<String>,

    /// Etherscan-compatible API endpoint, the chain is selected through the
    /// `chainid` query parameter.
    #[serde(default = "default_etherscan_api_url")]
    pub api_url: Url,

    /// Explorer frontend used to link to verified contracts.
    pub browser_url: Option<Url>,
}

impl Default for Etherscan {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_etherscan_api_url(),
            browser_url: None,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(pub String);

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SECRET")
    }
}

fn default_networks() -> BTreeMap<String, Network> {
    BTreeMap::from([(
        DEFAULT_NETWORK.to_string(),
        Network {
            url: "http://localhost:8545".parse().unwrap(),
            chain_id: None,
            accounts: Vec::new(),
            confirmations: None,
        },
    )])
}

fn default_etherscan_api_url() -> Url {
    "https://api.etherscan.io/v2/api".parse().unwrap()
}

/// Load the project configuration from a TOML file.
pub async fn load(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .await
        .with_context(|| format!("I/O error while reading {path:?}"))?;
    parse(&data).with_context(|| format!("invalid configuration in {path:?}"))
}

fn parse(data: &str) -> Result<Config> {
    // Not printing detailed error because it could leak private keys.
    toml::de::from_str(data).map_err(|_| anyhow!("TOML syntax error"))
}
