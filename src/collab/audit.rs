use crate::schemas::{AuditResult, BlockExtended, ProjectedBlock, TransactionExtended, TransactionStripped};
use anyhow::Result;
use bitcoin::Txid;
use futures::future::BoxFuture;

/// Post-block template audit.
pub trait AuditApi: Send + Sync {
    fn audit_block<'a>(
        &'a self,
        height: u32,
        txids: &'a [Txid],
        transactions: &'a [TransactionExtended],
        projected: &'a [ProjectedBlock],
    ) -> BoxFuture<'a, Result<AuditResult>>;
}

/// Persistence for audit artifacts and acceleration records. Implementations
/// carry their own retry semantics; the fan-out core logs and moves on.
pub trait Repositories: Send + Sync {
    fn save_template<'a>(
        &'a self,
        height: u32,
        template: &'a [TransactionStripped],
    ) -> BoxFuture<'a, Result<()>>;

    fn save_audit<'a>(&'a self, height: u32, audit: &'a AuditResult) -> BoxFuture<'a, Result<()>>;

    fn save_acceleration<'a>(
        &'a self,
        txid: &'a Txid,
        block: &'a BlockExtended,
        boost_rate: f64,
    ) -> BoxFuture<'a, Result<()>>;
}
