use crate::schemas::{
    MempoolInfo, MempoolTransactionExtended, TransactionStripped, TxInput,
};
use bitcoin::Txid;
use std::collections::HashMap;
use std::sync::Arc;

/// The mempool engine. Owns the unconfirmed transaction set, projected
/// positions and the outpoint spend map; the fan-out core only reads state
/// and forwards lifecycle notifications.
pub trait MempoolSource: Send + Sync {
    /// Current mempool keyed by txid. Shared snapshot, cheap to clone.
    fn mempool(&self) -> Arc<HashMap<Txid, MempoolTransactionExtended>>;

    fn mempool_info(&self) -> MempoolInfo;

    fn vbytes_per_second(&self) -> u32;

    fn latest_transactions(&self) -> Vec<TransactionStripped>;

    /// Whether projected positions reflect the current mempool. Projected
    /// block deltas are only meaningful in-sync.
    fn in_sync(&self) -> bool;

    /// Outpoint -> spending txid over the current mempool.
    fn spend_map(&self) -> Arc<HashMap<(Txid, u32), Txid>>;

    /// Deep copy for read-only template construction.
    fn cloned_mempool(&self) -> HashMap<Txid, MempoolTransactionExtended>;

    fn add_to_spend_map(&self, tx: &MempoolTransactionExtended);

    fn remove_from_spend_map(&self, vins: &[TxInput]);

    fn handle_rbf_transactions(
        &self,
        replacements: &HashMap<Txid, Vec<MempoolTransactionExtended>>,
    );

    fn handle_mined_rbf_transactions(
        &self,
        replacements: &HashMap<Txid, Vec<MempoolTransactionExtended>>,
    );

    /// Drop mined transactions from the live mempool in place.
    fn remove_mined(&self, txids: &[Txid]);
}
