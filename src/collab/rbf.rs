use crate::schemas::{MempoolTransactionExtended, RbfChanges, RbfSummaryEntry, RbfTree};
use bitcoin::Txid;
use std::collections::HashMap;

/// The replacement cache. Tracks replacement trees across mempool deltas and
/// block inclusion.
pub trait RbfCache: Send + Sync {
    /// Newest known replacement for a replaced txid, if any.
    fn replaced_by(&self, txid: &Txid) -> Option<Txid>;

    fn add(
        &self,
        replaced: &[MempoolTransactionExtended],
        replacement: &MempoolTransactionExtended,
    );

    fn evict(&self, txid: &Txid);

    fn mined(&self, txid: &Txid);

    /// Latest replacement trees; `full_rbf` selects trees whose root did not
    /// signal opt-in replaceability.
    fn rbf_trees(&self, full_rbf: bool) -> Vec<RbfTree>;

    /// Tree changes since the last call, or None when nothing changed.
    fn rbf_changes(&self) -> Option<RbfChanges>;

    fn latest_summary(&self) -> Option<Vec<RbfSummaryEntry>>;
}
