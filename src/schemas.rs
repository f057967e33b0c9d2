use bitcoin::{BlockHash, Txid};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

fn is_false(b: &bool) -> bool {
    !*b
}

/// Esplora-shaped transaction output. `asset` is only populated on sidechain
/// networks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxOutput {
    pub scriptpubkey: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: Txid,
    pub vout: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevout: Option<TxOutput>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_pegin: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionExtended {
    pub txid: Txid,
    pub fee: u64,
    pub vsize: u64,
    pub value: u64,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
    #[serde(rename = "firstSeen", default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<u64>,
}

/// Projected position of an unconfirmed transaction: which projected block it
/// sits in and how deep (in vsize) within that block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxPosition {
    pub block: usize,
    pub vsize: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpfpTxInfo {
    pub txid: Txid,
    pub fee: u64,
    pub weight: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpfpInfo {
    pub ancestors: Vec<CpfpTxInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_descendant: Option<CpfpTxInfo>,
    pub effective_fee_per_vsize: f64,
    pub sigops: u32,
    pub adjusted_vsize: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MempoolTransactionExtended {
    #[serde(flatten)]
    pub tx: TransactionExtended,
    #[serde(rename = "adjustedVsize")]
    pub adjusted_vsize: f64,
    #[serde(rename = "effectiveFeePerVsize")]
    pub effective_fee_per_vsize: f64,
    pub sigops: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<TxPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpfp: Option<CpfpInfo>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub acceleration: bool,
    /// Set when ancestor relations changed since the position was computed;
    /// delivery paths attach the CPFP detail block while this is set.
    #[serde(skip)]
    pub cpfp_dirty: bool,
}

impl MempoolTransactionExtended {
    pub fn txid(&self) -> Txid {
        self.tx.txid
    }

    /// Compressed form used in projected-block payloads.
    pub fn stripped(&self) -> TransactionStripped {
        TransactionStripped {
            txid: self.tx.txid,
            fee: self.tx.fee,
            vsize: self.adjusted_vsize,
            value: self.tx.value,
            rate: Some(self.effective_fee_per_vsize),
            acc: if self.acceleration { Some(true) } else { None },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionStripped {
    pub txid: Txid,
    pub fee: u64,
    pub vsize: f64,
    pub value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockExtras {
    pub total_fees: u64,
    pub median_fee: f64,
    pub fee_range: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_fees: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_weight: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockExtended {
    pub id: BlockHash,
    pub height: u32,
    pub timestamp: u64,
    pub tx_count: u32,
    pub size: u64,
    pub weight: u64,
    pub extras: BlockExtras,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MempoolBlock {
    pub block_size: u64,
    pub block_v_size: f64,
    pub n_tx: usize,
    pub total_fees: u64,
    pub median_fee: f64,
    pub fee_range: Vec<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxRateChange {
    pub txid: Txid,
    pub rate: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MempoolBlockDelta {
    pub added: Vec<TransactionStripped>,
    pub removed: Vec<Txid>,
    pub changed: Vec<TxRateChange>,
}

/// One projected block as an ordered compressed transaction list.
pub type ProjectedBlock = Vec<TransactionStripped>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RbfTransaction {
    #[serde(flatten)]
    pub tx: TransactionStripped,
    pub rbf: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mined: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RbfTree {
    pub tx: RbfTransaction,
    pub time: u64,
    #[serde(rename = "fullRbf")]
    pub full_rbf: bool,
    pub replaces: Vec<RbfTree>,
}

/// Replacement activity since the last fan-out: new/extended trees keyed by
/// their root, and a membership map from any replaced txid to its root.
#[derive(Clone, Debug, Default)]
pub struct RbfChanges {
    pub trees: HashMap<Txid, RbfTree>,
    pub map: HashMap<Txid, Txid>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RbfSummaryEntry {
    pub tx: TransactionStripped,
    pub time: u64,
    pub full_rbf: bool,
    pub replaces: Vec<Txid>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MempoolInfo {
    pub loaded: bool,
    pub size: usize,
    pub bytes: u64,
    pub usage: u64,
    pub mempoolminfee: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFees {
    pub fastest_fee: u64,
    pub half_hour_fee: u64,
    pub hour_fee: u64,
    pub economy_fee: u64,
    pub minimum_fee: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAdjustment {
    pub progress_percent: f64,
    pub difficulty_change: f64,
    pub estimated_retarget_date: u64,
    pub remaining_blocks: u32,
    pub remaining_time: u64,
    pub previous_retarget: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_time: Option<u64>,
    pub next_retarget_height: u32,
    pub time_avg: u64,
    pub expected_blocks: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prices {
    pub time: u64,
    #[serde(flatten)]
    pub rates: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    pub hostname: String,
    pub version: String,
    pub git_commit: String,
    pub backend: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeHealth {
    pub host: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtt: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiveStatistic {
    pub added: u64,
    pub count: u32,
    pub vbytes_per_second: u32,
    pub vsizes: Vec<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditResult {
    pub censored: Vec<Txid>,
    pub added: Vec<Txid>,
    pub fresh: Vec<Txid>,
    pub sigop: Vec<Txid>,
    pub fullrbf: Vec<Txid>,
    pub accelerated: Vec<Txid>,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// `{voutIdx: {vin, txid}}` entry of the per-event outspend index.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OutspendRef {
    pub vin: usize,
    pub txid: Txid,
}

/// `txPosition` payload. The CPFP detail block rides along while the
/// tracked transaction's ancestor set is marked dirty.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxPositionPayload {
    pub txid: Txid,
    pub position: TxPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpfp: Option<CpfpInfo>,
}

/// `projected-block-transactions` payload: either the full compressed list
/// (on subscribe, or when the delta would be larger than half the block) or
/// the delta.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectedBlockTransactions {
    pub index: usize,
    #[serde(
        rename = "blockTransactions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub block_transactions: Option<ProjectedBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<MempoolBlockDelta>,
}

/// Access to the plain transaction shared by mempool and confirmed forms, so
/// the address index can be built over either.
pub trait HasTransaction {
    fn transaction(&self) -> &TransactionExtended;
}

impl HasTransaction for TransactionExtended {
    fn transaction(&self) -> &TransactionExtended {
        self
    }
}

impl HasTransaction for MempoolTransactionExtended {
    fn transaction(&self) -> &TransactionExtended {
        &self.tx
    }
}
