use crate::schemas::{MempoolTransactionExtended, NodeHealth};
use anyhow::Result;
use bitcoin::Txid;
use futures::future::BoxFuture;

/// The upstream node API. Esplora backends return fully-populated
/// transactions from the mempool engine already; other backends go through
/// `full_transaction` before a transaction payload leaves the server.
pub trait NodeBackend: Send + Sync {
    fn health_status(&self) -> Vec<NodeHealth>;

    fn full_transaction<'a>(
        &'a self,
        txid: &'a Txid,
    ) -> BoxFuture<'a, Result<MempoolTransactionExtended>>;
}

/// Full form of a mempool transaction for delivery. Esplora entries are
/// already complete; otherwise fetch from the node, and on a transient
/// failure fall back to the mempool copy so the rest of the response still
/// goes out.
pub async fn enriched_transaction(tx: &MempoolTransactionExtended) -> MempoolTransactionExtended {
    if crate::config::backend_is_esplora() {
        return tx.clone();
    }
    match super::node().full_transaction(&tx.txid()).await {
        Ok(full) => full,
        Err(e) => {
            if crate::config::debug_enabled() {
                eprintln!("[ws] full transaction fetch failed for {}: {e:?}", tx.txid());
            }
            tx.clone()
        }
    }
}
