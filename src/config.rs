use anyhow::{Context, Result};
use bitcoin::Network;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();
static NETWORK: OnceLock<Network> = OnceLock::new();

/// Which kind of node backend serves full transaction data. Esplora already
/// returns fully-populated transactions; a bare core node needs the
/// enrichment fetch on delivery paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeBackendKind {
    Esplora,
    Core,
}

fn parse_network(s: &str) -> Result<Network> {
    let normalized = s.trim().to_ascii_lowercase();
    let mapped = match normalized.as_str() {
        "mainnet" => "bitcoin",
        "testnet3" => "testnet",
        other => other,
    };
    Network::from_str(mapped).map_err(|_| {
        anyhow::anyhow!(
            "invalid value for network: expected mainnet | regtest | signet | testnet | testnet3 | testnet4"
        )
    })
}

fn parse_backend(s: &str) -> Result<NodeBackendKind> {
    match s.trim().to_ascii_lowercase().as_str() {
        "esplora" => Ok(NodeBackendKind::Esplora),
        "core" | "bitcoind" | "none" => Ok(NodeBackendKind::Core),
        _ => Err(anyhow::anyhow!("invalid value for backend: use esplora | core")),
    }
}

fn default_ws_host() -> SocketAddr {
    "0.0.0.0:8999".parse().expect("parse default ws host")
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_backend() -> String {
    "esplora".to_string()
}

fn default_initial_blocks_amount() -> usize {
    8
}

fn default_max_tracked_addresses() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_ws_host")]
    pub ws_host: SocketAddr,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_initial_blocks_amount")]
    pub initial_blocks_amount: usize,
    #[serde(default = "default_max_tracked_addresses")]
    pub max_tracked_addresses: usize,
    #[serde(default)]
    pub advanced_gbt_mempool: bool,
    #[serde(default)]
    pub advanced_gbt_audit: bool,
    #[serde(default)]
    pub rust_gbt: bool,
    #[serde(default)]
    pub audit: bool,
    #[serde(default)]
    pub accelerations: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub debug_ignore_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ws_host: SocketAddr,
    pub network: Network,
    pub backend: NodeBackendKind,
    pub initial_blocks_amount: usize,
    pub max_tracked_addresses: usize,
    pub advanced_gbt_mempool: bool,
    pub advanced_gbt_audit: bool,
    pub rust_gbt: bool,
    pub audit: bool,
    pub accelerations: bool,
    pub debug: bool,
    pub debug_ignore_ms: u64,
}

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Path to JSON config file.
    #[arg(long, default_value = "./config.json")]
    pub config_path: String,
}

fn load_config_file(path: &str) -> Result<ConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {path}"))?;
    serde_json::from_str(&raw).context("failed to parse config JSON")
}

impl AppConfig {
    fn from_file(file: ConfigFile) -> Result<Self> {
        let network = parse_network(&file.network)?;
        let backend = parse_backend(&file.backend)?;

        Ok(Self {
            ws_host: file.ws_host,
            network,
            backend,
            initial_blocks_amount: file.initial_blocks_amount,
            max_tracked_addresses: file.max_tracked_addresses,
            advanced_gbt_mempool: file.advanced_gbt_mempool,
            advanced_gbt_audit: file.advanced_gbt_audit,
            rust_gbt: file.rust_gbt,
            audit: file.audit,
            accelerations: file.accelerations,
            debug: file.debug,
            debug_ignore_ms: file.debug_ignore_ms,
        })
    }
}

pub fn init_config_from(cfg: AppConfig) -> Result<()> {
    if cfg.initial_blocks_amount == 0 {
        anyhow::bail!("initial_blocks_amount must be greater than 0");
    }
    if cfg.max_tracked_addresses == 0 {
        anyhow::bail!("max_tracked_addresses must be greater than 0");
    }

    CONFIG
        .set(cfg.clone())
        .map_err(|_| anyhow::anyhow!("config already initialized"))?;

    NETWORK
        .set(cfg.network)
        .map_err(|_| anyhow::anyhow!("network already initialized"))?;

    Ok(())
}

/// Parse CLI args, load the JSON config file and store the config globally.
/// Embedding binaries call this once before wiring collaborators.
pub fn init_config() -> Result<()> {
    let args = CliArgs::parse();
    let file = load_config_file(&args.config_path)?;
    let cfg = AppConfig::from_file(file)?;
    init_config_from(cfg)
}

pub fn get_config() -> &'static AppConfig {
    CONFIG.get().expect("config not initialized")
}

pub fn get_network() -> Network {
    *NETWORK.get().expect("network not initialized")
}

pub fn backend_is_esplora() -> bool {
    get_config().backend == NodeBackendKind::Esplora
}

pub fn debug_enabled() -> bool {
    CONFIG.get().map(|c| c.debug).unwrap_or(false)
}

pub fn debug_ignore_ms() -> u64 {
    CONFIG.get().map(|c| c.debug_ignore_ms).unwrap_or(0)
}
