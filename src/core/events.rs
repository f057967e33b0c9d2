use crate::core::fanout::FanoutEngine;
use crate::core::session::clients;
use crate::schemas::{
    BlockExtended, LiveStatistic, MempoolTransactionExtended, Prices, TransactionExtended,
};
use anyhow::Result;
use bitcoin::Txid;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;

/// One upstream event. Collaborators construct these; the engine task
/// consumes them in arrival order.
pub enum UpstreamEvent {
    MempoolDelta {
        mempool: Arc<HashMap<Txid, MempoolTransactionExtended>>,
        mempool_size: usize,
        added: Vec<MempoolTransactionExtended>,
        deleted: Vec<MempoolTransactionExtended>,
        accelerated: Vec<Txid>,
    },
    NewBlock {
        block: BlockExtended,
        txids: Vec<Txid>,
        transactions: Vec<TransactionExtended>,
    },
    Reorg,
    LoadingChanged {
        indicators: BTreeMap<String, f64>,
    },
    PriceUpdated {
        prices: Prices,
    },
    StatisticTick {
        statistic: LiveStatistic,
    },
    DonationConfirmed {
        donation_id: String,
    },
}

static EVENT_TX: OnceLock<mpsc::UnboundedSender<UpstreamEvent>> = OnceLock::new();

/// Create the upstream event channel once at startup; the returned receiver
/// is handed to `run_engine`.
pub fn install_event_channel() -> Result<mpsc::UnboundedReceiver<UpstreamEvent>> {
    let (tx, rx) = mpsc::unbounded_channel();
    EVENT_TX
        .set(tx)
        .map_err(|_| anyhow::anyhow!("event channel already installed"))?;
    Ok(rx)
}

/// Hand an upstream event to the engine. Publishing before the channel is
/// installed is a programming error.
pub fn publish(event: UpstreamEvent) {
    let sender = EVENT_TX.get().expect("event channel not installed");
    let _ = sender.send(event);
}

/// Single-writer event loop. Each handler runs to completion before the next
/// event is taken, so no two handlers interleave writes to the shared
/// snapshot, and every handler walks a client set sampled at its start.
pub async fn run_engine(mut events: mpsc::UnboundedReceiver<UpstreamEvent>) {
    let mut engine = FanoutEngine::new();
    while let Some(event) = events.recv().await {
        let connected = clients().snapshot().await;
        match event {
            UpstreamEvent::MempoolDelta { mempool, mempool_size, added, deleted, accelerated } => {
                engine
                    .handle_mempool_change(
                        &connected,
                        mempool,
                        mempool_size,
                        added,
                        deleted,
                        accelerated,
                    )
                    .await;
            }
            UpstreamEvent::NewBlock { block, txids, transactions } => {
                engine.handle_new_block(&connected, block, txids, transactions).await;
            }
            UpstreamEvent::Reorg => engine.handle_reorg(&connected).await,
            UpstreamEvent::LoadingChanged { indicators } => {
                engine.handle_loading_changed(&connected, indicators).await;
            }
            UpstreamEvent::PriceUpdated { prices } => {
                engine.handle_price_updated(&connected, prices).await;
            }
            UpstreamEvent::StatisticTick { statistic } => {
                engine.handle_new_statistic(&connected, statistic).await;
            }
            UpstreamEvent::DonationConfirmed { donation_id } => {
                engine.handle_donation_confirmed(&connected, &donation_id).await;
            }
        }
    }
}
