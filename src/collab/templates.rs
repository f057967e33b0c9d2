use crate::schemas::{
    MempoolBlock, MempoolBlockDelta, MempoolTransactionExtended, ProjectedBlock,
};
use anyhow::Result;
use bitcoin::Txid;
use futures::future::BoxFuture;
use std::collections::HashMap;

/// The block-template builder. Synchronous contract on the accessors: after
/// an update call returns, `mempool_blocks` and `mempool_block_deltas`
/// reflect the new mempool state.
pub trait TemplateBuilder: Send + Sync {
    fn mempool_blocks(&self) -> Vec<MempoolBlock>;

    /// Per projected block, what changed relative to the previous projection.
    fn mempool_block_deltas(&self) -> Vec<MempoolBlockDelta>;

    /// Projected blocks as ordered compressed transaction lists.
    fn mempool_blocks_with_transactions(&self) -> Vec<ProjectedBlock>;

    /// Incremental template update from a mempool delta.
    fn update_templates<'a>(
        &'a self,
        added: &'a [MempoolTransactionExtended],
        removed: &'a [MempoolTransactionExtended],
        accelerated: &'a [Txid],
    ) -> BoxFuture<'a, Result<()>>;

    /// Full template rebuild over the given mempool.
    fn make_templates<'a>(
        &'a self,
        mempool: &'a HashMap<Txid, MempoolTransactionExtended>,
    ) -> BoxFuture<'a, Result<()>>;

    /// Template construction over a detached mempool copy; does not touch the
    /// live projection. Used when the audit algorithm differs from the live
    /// one.
    fn project_blocks<'a>(
        &'a self,
        mempool: HashMap<Txid, MempoolTransactionExtended>,
    ) -> BoxFuture<'a, Result<Vec<ProjectedBlock>>>;
}
