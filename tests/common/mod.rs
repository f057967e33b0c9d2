//! Shared integration harness: in-memory collaborator mocks wired into the
//! global registry, plus builders for mempool/block fixtures.
//!
//! Collaborators and the shared snapshot are process-wide, so tests take the
//! harness lock and reset state before running.

#![allow(dead_code)]

use anyhow::Result;
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Txid};
use futures::future::BoxFuture;
use pulso::collab;
use pulso::config::{AppConfig, NodeBackendKind};
use pulso::core::session::{next_client_id, ClientHandle, ClientSession};
use pulso::core::snapshot::shared_snapshot;
use pulso::schemas::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, OnceLock};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// fixtures

pub fn txid(n: u8) -> Txid {
    Txid::from_byte_array([n; 32])
}

pub fn block_hash(n: u8) -> BlockHash {
    BlockHash::from_byte_array([n; 32])
}

pub fn vin_from(src: Txid, vout: u32) -> TxInput {
    TxInput { txid: src, vout, prevout: None, is_pegin: false }
}

pub fn vout_to(script: &str, address: Option<&str>, value: u64) -> TxOutput {
    TxOutput {
        scriptpubkey: script.to_string(),
        scriptpubkey_address: address.map(str::to_string),
        value,
        asset: None,
    }
}

pub fn plain_tx(n: u8) -> TransactionExtended {
    TransactionExtended {
        txid: txid(n),
        fee: 1_000,
        vsize: 140,
        value: 90_000,
        vin: vec![vin_from(txid(n.wrapping_add(100)), 0)],
        vout: vec![vout_to("0014aa00", None, 90_000)],
        first_seen: None,
    }
}

pub fn mem_tx(n: u8) -> MempoolTransactionExtended {
    MempoolTransactionExtended {
        tx: plain_tx(n),
        adjusted_vsize: 140.0,
        effective_fee_per_vsize: 7.1,
        sigops: 1,
        position: None,
        cpfp: None,
        acceleration: false,
        cpfp_dirty: false,
    }
}

pub fn positioned_tx(n: u8, block: usize, vsize: f64) -> MempoolTransactionExtended {
    let mut tx = mem_tx(n);
    tx.position = Some(TxPosition { block, vsize });
    tx
}

pub fn block_at(height: u32, n: u8) -> BlockExtended {
    BlockExtended {
        id: block_hash(n),
        height,
        timestamp: 1_700_000_000 + height as u64 * 600,
        tx_count: 1,
        size: 1_000_000,
        weight: 4_000_000,
        extras: BlockExtras {
            total_fees: 12_345_678,
            median_fee: 10.0,
            fee_range: vec![1.0, 5.0, 10.0],
            ..Default::default()
        },
    }
}

pub fn mempool_info(size: usize) -> MempoolInfo {
    MempoolInfo { loaded: true, size, bytes: 1_000, usage: 2_000, mempoolminfee: 0.00001 }
}

pub fn recommended_fees() -> RecommendedFees {
    RecommendedFees {
        fastest_fee: 20,
        half_hour_fee: 15,
        hour_fee: 10,
        economy_fee: 5,
        minimum_fee: 1,
    }
}

pub fn difficulty_adjustment() -> DifficultyAdjustment {
    DifficultyAdjustment {
        progress_percent: 42.0,
        difficulty_change: 1.5,
        estimated_retarget_date: 1_700_100_000,
        remaining_blocks: 1_000,
        remaining_time: 600_000,
        previous_retarget: -0.7,
        previous_time: Some(1_699_000_000),
        next_retarget_height: 850_000,
        time_avg: 600,
        expected_blocks: 1_008.0,
    }
}

pub fn backend_info() -> BackendInfo {
    BackendInfo {
        hostname: "observatory-1".to_string(),
        version: "0.1.0".to_string(),
        git_commit: "0000000".to_string(),
        backend: "esplora".to_string(),
    }
}

pub fn prices() -> Prices {
    let mut rates = BTreeMap::new();
    rates.insert("USD".to_string(), 60_000.0);
    rates.insert("EUR".to_string(), 55_000.0);
    Prices { time: 1_700_000_000, rates }
}

pub fn stripped(n: u8, vsize: f64) -> TransactionStripped {
    TransactionStripped { txid: txid(n), fee: 1_000, vsize, value: 90_000, rate: None, acc: None }
}

// ---------------------------------------------------------------------------
// mock collaborators

#[derive(Default)]
pub struct MockMempoolState {
    pub mempool: HashMap<Txid, MempoolTransactionExtended>,
    pub info: MempoolInfo,
    pub vbytes_per_second: u32,
    pub latest: Vec<TransactionStripped>,
    pub in_sync: bool,
    pub spend_map: HashMap<(Txid, u32), Txid>,
    pub removed_mined: Vec<Txid>,
    pub rbf_notified: usize,
    pub mined_rbf_notified: usize,
}

#[derive(Default)]
pub struct MockMempool {
    pub state: Mutex<MockMempoolState>,
}

impl collab::MempoolSource for MockMempool {
    fn mempool(&self) -> std::sync::Arc<HashMap<Txid, MempoolTransactionExtended>> {
        std::sync::Arc::new(self.state.lock().unwrap().mempool.clone())
    }

    fn mempool_info(&self) -> MempoolInfo {
        self.state.lock().unwrap().info.clone()
    }

    fn vbytes_per_second(&self) -> u32 {
        self.state.lock().unwrap().vbytes_per_second
    }

    fn latest_transactions(&self) -> Vec<TransactionStripped> {
        self.state.lock().unwrap().latest.clone()
    }

    fn in_sync(&self) -> bool {
        self.state.lock().unwrap().in_sync
    }

    fn spend_map(&self) -> std::sync::Arc<HashMap<(Txid, u32), Txid>> {
        std::sync::Arc::new(self.state.lock().unwrap().spend_map.clone())
    }

    fn cloned_mempool(&self) -> HashMap<Txid, MempoolTransactionExtended> {
        self.state.lock().unwrap().mempool.clone()
    }

    fn add_to_spend_map(&self, tx: &MempoolTransactionExtended) {
        let mut state = self.state.lock().unwrap();
        for vin in &tx.tx.vin {
            state.spend_map.insert((vin.txid, vin.vout), tx.txid());
        }
    }

    fn remove_from_spend_map(&self, vins: &[TxInput]) {
        let mut state = self.state.lock().unwrap();
        for vin in vins {
            state.spend_map.remove(&(vin.txid, vin.vout));
        }
    }

    fn handle_rbf_transactions(
        &self,
        _replacements: &HashMap<Txid, Vec<MempoolTransactionExtended>>,
    ) {
        self.state.lock().unwrap().rbf_notified += 1;
    }

    fn handle_mined_rbf_transactions(
        &self,
        _replacements: &HashMap<Txid, Vec<MempoolTransactionExtended>>,
    ) {
        self.state.lock().unwrap().mined_rbf_notified += 1;
    }

    fn remove_mined(&self, txids: &[Txid]) {
        let mut state = self.state.lock().unwrap();
        for txid in txids {
            state.mempool.remove(txid);
        }
        state.removed_mined.extend_from_slice(txids);
    }
}

#[derive(Default)]
pub struct MockTemplatesState {
    pub blocks: Vec<MempoolBlock>,
    pub deltas: Vec<MempoolBlockDelta>,
    pub with_transactions: Vec<ProjectedBlock>,
    pub update_calls: usize,
    pub make_calls: usize,
    pub project_calls: usize,
}

#[derive(Default)]
pub struct MockTemplates {
    pub state: Mutex<MockTemplatesState>,
}

impl collab::TemplateBuilder for MockTemplates {
    fn mempool_blocks(&self) -> Vec<MempoolBlock> {
        self.state.lock().unwrap().blocks.clone()
    }

    fn mempool_block_deltas(&self) -> Vec<MempoolBlockDelta> {
        self.state.lock().unwrap().deltas.clone()
    }

    fn mempool_blocks_with_transactions(&self) -> Vec<ProjectedBlock> {
        self.state.lock().unwrap().with_transactions.clone()
    }

    fn update_templates<'a>(
        &'a self,
        _added: &'a [MempoolTransactionExtended],
        _removed: &'a [MempoolTransactionExtended],
        _accelerated: &'a [Txid],
    ) -> BoxFuture<'a, Result<()>> {
        self.state.lock().unwrap().update_calls += 1;
        Box::pin(async { Ok(()) })
    }

    fn make_templates<'a>(
        &'a self,
        _mempool: &'a HashMap<Txid, MempoolTransactionExtended>,
    ) -> BoxFuture<'a, Result<()>> {
        self.state.lock().unwrap().make_calls += 1;
        Box::pin(async { Ok(()) })
    }

    fn project_blocks<'a>(
        &'a self,
        _mempool: HashMap<Txid, MempoolTransactionExtended>,
    ) -> BoxFuture<'a, Result<Vec<ProjectedBlock>>> {
        let mut state = self.state.lock().unwrap();
        state.project_calls += 1;
        let projected = state.with_transactions.clone();
        Box::pin(async move { Ok(projected) })
    }
}

#[derive(Default)]
pub struct MockRbfState {
    pub replaced_by: HashMap<Txid, Txid>,
    pub added: Vec<Txid>,
    pub evicted: Vec<Txid>,
    pub mined: Vec<Txid>,
    pub trees: Vec<RbfTree>,
    pub full_trees: Vec<RbfTree>,
    pub changes: Option<RbfChanges>,
    pub summary: Option<Vec<RbfSummaryEntry>>,
}

#[derive(Default)]
pub struct MockRbfCache {
    pub state: Mutex<MockRbfState>,
}

impl collab::RbfCache for MockRbfCache {
    fn replaced_by(&self, txid: &Txid) -> Option<Txid> {
        self.state.lock().unwrap().replaced_by.get(txid).copied()
    }

    fn add(
        &self,
        _replaced: &[MempoolTransactionExtended],
        replacement: &MempoolTransactionExtended,
    ) {
        self.state.lock().unwrap().added.push(replacement.txid());
    }

    fn evict(&self, txid: &Txid) {
        self.state.lock().unwrap().evicted.push(*txid);
    }

    fn mined(&self, txid: &Txid) {
        self.state.lock().unwrap().mined.push(*txid);
    }

    fn rbf_trees(&self, full_rbf: bool) -> Vec<RbfTree> {
        let state = self.state.lock().unwrap();
        if full_rbf { state.full_trees.clone() } else { state.trees.clone() }
    }

    fn rbf_changes(&self) -> Option<RbfChanges> {
        self.state.lock().unwrap().changes.clone()
    }

    fn latest_summary(&self) -> Option<Vec<RbfSummaryEntry>> {
        self.state.lock().unwrap().summary.clone()
    }
}

#[derive(Default)]
pub struct MockNodeState {
    pub health: Vec<NodeHealth>,
    pub full_transactions: HashMap<Txid, MempoolTransactionExtended>,
}

#[derive(Default)]
pub struct MockNode {
    pub state: Mutex<MockNodeState>,
}

impl collab::NodeBackend for MockNode {
    fn health_status(&self) -> Vec<NodeHealth> {
        self.state.lock().unwrap().health.clone()
    }

    fn full_transaction<'a>(
        &'a self,
        txid: &'a Txid,
    ) -> BoxFuture<'a, Result<MempoolTransactionExtended>> {
        let found = self.state.lock().unwrap().full_transactions.get(txid).cloned();
        Box::pin(async move {
            found.ok_or_else(|| anyhow::anyhow!("transaction {txid} not found upstream"))
        })
    }
}

#[derive(Default)]
pub struct MockBlocks {
    pub blocks: Mutex<Vec<BlockExtended>>,
}

impl collab::BlockSource for MockBlocks {
    fn blocks(&self) -> Vec<BlockExtended> {
        self.blocks.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct MockDifficulty {
    pub da: Mutex<Option<DifficultyAdjustment>>,
}

impl collab::DifficultyApi for MockDifficulty {
    fn difficulty_adjustment(&self) -> Option<DifficultyAdjustment> {
        self.da.lock().unwrap().clone()
    }
}

pub struct MockFees;

impl collab::FeeApi for MockFees {
    fn recommended_fees(&self) -> RecommendedFees {
        recommended_fees()
    }
}

pub struct MockPrices;

impl collab::PriceFeed for MockPrices {
    fn latest_prices(&self) -> Prices {
        prices()
    }
}

pub struct MockBackendInfo;

impl collab::BackendInfoApi for MockBackendInfo {
    fn backend_info(&self) -> BackendInfo {
        backend_info()
    }
}

#[derive(Default)]
pub struct MockLoading {
    pub indicators: Mutex<BTreeMap<String, f64>>,
}

impl collab::LoadingIndicatorsApi for MockLoading {
    fn loading_indicators(&self) -> BTreeMap<String, f64> {
        self.indicators.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct MockAudit {
    pub result: Mutex<Option<AuditResult>>,
}

impl collab::AuditApi for MockAudit {
    fn audit_block<'a>(
        &'a self,
        _height: u32,
        _txids: &'a [Txid],
        _transactions: &'a [TransactionExtended],
        _projected: &'a [ProjectedBlock],
    ) -> BoxFuture<'a, Result<AuditResult>> {
        let result = self.result.lock().unwrap().clone();
        Box::pin(async move { result.ok_or_else(|| anyhow::anyhow!("no audit result staged")) })
    }
}

#[derive(Default)]
pub struct MockReposState {
    pub templates: Vec<u32>,
    pub audits: Vec<u32>,
    pub accelerations: Vec<Txid>,
}

#[derive(Default)]
pub struct MockRepos {
    pub state: Mutex<MockReposState>,
}

impl collab::Repositories for MockRepos {
    fn save_template<'a>(
        &'a self,
        height: u32,
        _template: &'a [TransactionStripped],
    ) -> BoxFuture<'a, Result<()>> {
        self.state.lock().unwrap().templates.push(height);
        Box::pin(async { Ok(()) })
    }

    fn save_audit<'a>(&'a self, height: u32, _audit: &'a AuditResult) -> BoxFuture<'a, Result<()>> {
        self.state.lock().unwrap().audits.push(height);
        Box::pin(async { Ok(()) })
    }

    fn save_acceleration<'a>(
        &'a self,
        txid: &'a Txid,
        _block: &'a BlockExtended,
        _boost_rate: f64,
    ) -> BoxFuture<'a, Result<()>> {
        self.state.lock().unwrap().accelerations.push(*txid);
        Box::pin(async { Ok(()) })
    }
}

// ---------------------------------------------------------------------------
// environment

pub struct TestEnv {
    pub mempool: std::sync::Arc<MockMempool>,
    pub templates: std::sync::Arc<MockTemplates>,
    pub rbf: std::sync::Arc<MockRbfCache>,
    pub node: std::sync::Arc<MockNode>,
    pub blocks: std::sync::Arc<MockBlocks>,
    pub difficulty: std::sync::Arc<MockDifficulty>,
    pub loading: std::sync::Arc<MockLoading>,
    pub audit: std::sync::Arc<MockAudit>,
    pub repos: std::sync::Arc<MockRepos>,
}

impl TestEnv {
    fn reset(&self) {
        *self.mempool.state.lock().unwrap() =
            MockMempoolState { in_sync: true, ..Default::default() };
        *self.templates.state.lock().unwrap() = MockTemplatesState::default();
        *self.rbf.state.lock().unwrap() = MockRbfState::default();
        *self.node.state.lock().unwrap() = MockNodeState {
            health: vec![NodeHealth { host: "node-1".to_string(), active: true, rtt: Some(3.5) }],
            ..Default::default()
        };
        *self.blocks.blocks.lock().unwrap() = Vec::new();
        *self.difficulty.da.lock().unwrap() = Some(difficulty_adjustment());
        *self.loading.indicators.lock().unwrap() = BTreeMap::new();
        *self.audit.result.lock().unwrap() = None;
        *self.repos.state.lock().unwrap() = MockReposState::default();
    }
}

pub fn base_config() -> AppConfig {
    AppConfig {
        ws_host: "127.0.0.1:0".parse().unwrap(),
        network: bitcoin::Network::Bitcoin,
        backend: NodeBackendKind::Esplora,
        initial_blocks_amount: 4,
        max_tracked_addresses: 3,
        advanced_gbt_mempool: false,
        advanced_gbt_audit: false,
        rust_gbt: false,
        audit: false,
        accelerations: false,
        debug: false,
        debug_ignore_ms: 0,
    }
}

static ENV: OnceLock<TestEnv> = OnceLock::new();
static HARNESS_LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();

fn install_env(cfg: AppConfig) -> &'static TestEnv {
    ENV.get_or_init(|| {
        // Repeat initialization across tests in one binary is fine; the
        // first one wins.
        let _ = pulso::config::init_config_from(cfg);

        let env = TestEnv {
            mempool: std::sync::Arc::new(MockMempool::default()),
            templates: std::sync::Arc::new(MockTemplates::default()),
            rbf: std::sync::Arc::new(MockRbfCache::default()),
            node: std::sync::Arc::new(MockNode::default()),
            blocks: std::sync::Arc::new(MockBlocks::default()),
            difficulty: std::sync::Arc::new(MockDifficulty::default()),
            loading: std::sync::Arc::new(MockLoading::default()),
            audit: std::sync::Arc::new(MockAudit::default()),
            repos: std::sync::Arc::new(MockRepos::default()),
        };

        collab::install_mempool(env.mempool.clone()).unwrap();
        collab::install_templates(env.templates.clone()).unwrap();
        collab::install_rbf_cache(env.rbf.clone()).unwrap();
        collab::install_node(env.node.clone()).unwrap();
        collab::install_blocks(env.blocks.clone()).unwrap();
        collab::install_difficulty(env.difficulty.clone()).unwrap();
        collab::install_fees(std::sync::Arc::new(MockFees)).unwrap();
        collab::install_prices(std::sync::Arc::new(MockPrices)).unwrap();
        collab::install_backend_info(std::sync::Arc::new(MockBackendInfo)).unwrap();
        collab::install_loading(env.loading.clone()).unwrap();
        collab::install_audit(env.audit.clone()).unwrap();
        collab::install_repositories(env.repos.clone()).unwrap();

        env
    })
}

/// Take the harness for one test: serializes access to the process-wide
/// snapshot and mocks, and resets both.
pub async fn setup(cfg: AppConfig) -> (&'static TestEnv, tokio::sync::MutexGuard<'static, ()>) {
    let guard = HARNESS_LOCK.get_or_init(|| tokio::sync::Mutex::new(())).lock().await;
    let env = install_env(cfg);
    env.reset();
    shared_snapshot().clear();
    (env, guard)
}

// ---------------------------------------------------------------------------
// client plumbing

pub struct TestClient {
    pub handle: std::sync::Arc<ClientHandle>,
    pub outbox: mpsc::UnboundedReceiver<String>,
}

pub fn test_client() -> TestClient {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = std::sync::Arc::new(ClientHandle::new(
        next_client_id(),
        ClientSession::new("127.0.0.1".to_string()),
        tx,
    ));
    TestClient { handle, outbox: rx }
}

impl TestClient {
    pub async fn set_session(&self, mutate: impl FnOnce(&mut ClientSession)) {
        let mut session = self.handle.session.lock().await;
        mutate(&mut session);
    }

    /// Next message already sitting in the outbox, parsed.
    pub fn recv(&mut self) -> Option<serde_json::Value> {
        self.outbox
            .try_recv()
            .ok()
            .map(|raw| serde_json::from_str(&raw).expect("fan-out messages are valid JSON"))
    }

    pub fn assert_silent(&mut self) {
        assert!(self.outbox.try_recv().is_err(), "expected no message");
    }
}

/// Parse decoder output frames.
pub fn parse_all(sends: Vec<String>) -> Vec<serde_json::Value> {
    sends
        .into_iter()
        .map(|raw| serde_json::from_str(&raw).expect("responses are valid JSON"))
        .collect()
}
