use crate::collab;
use crate::collab::node::enriched_transaction;
use crate::config::get_config;
use crate::core::address::build_address_index;
use crate::core::rbf::{
    build_outspend_index, find_mined_rbf_transactions, find_rbf_transactions,
};
use crate::core::session::{ClientHandle, ClientSession, TrackRbf};
use crate::core::snapshot::{
    fragment, join_serialized, shared_snapshot, Response, SerializationCache,
};
use crate::debug_timer_log;
use crate::schemas::{
    BlockExtended, HasTransaction, LiveStatistic, MempoolTransactionExtended, Prices,
    ProjectedBlockTransactions, TransactionExtended, TransactionStripped, TxPositionPayload,
};
use bitcoin::{BlockHash, Txid};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// A confirmed transaction as delivered to address trackers.
#[derive(Serialize)]
struct StampedTransaction<'a> {
    #[serde(flatten)]
    tx: &'a TransactionExtended,
    confirmed: bool,
    block_height: u32,
    block_hash: BlockHash,
    block_time: u64,
}

fn stamp<'a>(tx: &'a TransactionExtended, block: &BlockExtended) -> StampedTransaction<'a> {
    StampedTransaction {
        tx,
        confirmed: true,
        block_height: block.height,
        block_hash: block.id,
        block_time: block.timestamp,
    }
}

/// Per-tracked-key activity buckets of a `multi-*-transactions` payload.
#[derive(Serialize)]
struct AddressActivity<'a> {
    mempool: Vec<MempoolTransactionExtended>,
    confirmed: Vec<StampedTransaction<'a>>,
    removed: Vec<MempoolTransactionExtended>,
}

fn lookup<'a, T: HasTransaction>(
    index: &HashMap<String, Vec<usize>>,
    txs: &'a [T],
    key: &str,
) -> Vec<&'a T> {
    index
        .get(key)
        .map(|hits| hits.iter().map(|&i| &txs[i]).collect())
        .unwrap_or_default()
}

fn tx_touches_asset(tx: &TransactionExtended, asset: &str) -> bool {
    tx.vout.iter().any(|o| o.asset.as_deref() == Some(asset))
        || (asset == crate::consts::NATIVE_ASSET_ID && tx.vin.iter().any(|i| i.is_pegin))
}

async fn enrich_all(txs: &[&MempoolTransactionExtended]) -> Vec<MempoolTransactionExtended> {
    let mut out = Vec::with_capacity(txs.len());
    for tx in txs {
        out.push(enriched_transaction(tx).await);
    }
    out
}

/// Vsize-weighted share of the projected block that made it into the mined
/// block. Undefined (omitted) when the projection is empty.
fn block_similarity(projected: &[TransactionStripped], mined: &[Txid]) -> Option<f64> {
    if projected.is_empty() {
        return None;
    }
    let mined: HashSet<&Txid> = mined.iter().collect();
    let total: f64 = projected.iter().map(|tx| tx.vsize).sum();
    if total <= 0.0 {
        return None;
    }
    let matched: f64 = projected
        .iter()
        .filter(|tx| mined.contains(&tx.txid))
        .map(|tx| tx.vsize)
        .sum();
    Some(matched / total)
}

async fn session_snapshots(
    connected: &[Arc<ClientHandle>],
) -> Vec<(Arc<ClientHandle>, ClientSession)> {
    let mut sessions = Vec::with_capacity(connected.len());
    for client in connected {
        let session = client.session.lock().await.clone();
        sessions.push((client.clone(), session));
    }
    sessions
}

/// The fan-out engine. One instance lives inside the event loop; handlers
/// refresh the shared snapshot, precompute per-event artifacts, then walk
/// the sampled client set composing tailored responses through the
/// serialization cache.
pub struct FanoutEngine {
    blocks: Vec<BlockExtended>,
}

impl FanoutEngine {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub async fn handle_mempool_change(
        &mut self,
        connected: &[Arc<ClientHandle>],
        mempool: Arc<HashMap<Txid, MempoolTransactionExtended>>,
        mempool_size: usize,
        added: Vec<MempoolTransactionExtended>,
        deleted: Vec<MempoolTransactionExtended>,
        accelerated: Vec<Txid>,
    ) {
        debug_timer_log!("handle_mempool_change");
        let cfg = get_config();
        let mempool_src = collab::mempool();
        let templates = collab::templates();
        let rbf_cache = collab::rbf_cache();

        if cfg.rust_gbt || cfg.advanced_gbt_mempool {
            if let Err(e) = templates.update_templates(&added, &deleted, &accelerated).await {
                eprintln!("[fanout] template update failed: {e:?}");
            }
        } else if let Err(e) = templates.make_templates(&mempool).await {
            eprintln!("[fanout] template rebuild failed: {e:?}");
        }

        let mempool_info = mempool_src.mempool_info();
        let vbytes_per_second = mempool_src.vbytes_per_second();
        let latest_transactions = mempool_src.latest_transactions();
        let fees = collab::fees().recommended_fees();
        let da = collab::difficulty().difficulty_adjustment();

        // Replacements: added txs spending an input a deleted tx spent.
        let rbf_map = find_rbf_transactions(&added, &deleted);
        let mut rbf_changes = None;
        let mut rbf_trees = None;
        let mut full_rbf_trees = None;
        let mut rbf_summary = None;
        if !rbf_map.is_empty() {
            mempool_src.handle_rbf_transactions(&rbf_map);
            for (replacement_txid, replaced) in &rbf_map {
                let replacement = mempool
                    .get(replacement_txid)
                    .or_else(|| added.iter().find(|tx| tx.txid() == *replacement_txid));
                if let Some(replacement) = replacement {
                    rbf_cache.add(replaced, replacement);
                }
            }
            rbf_changes = rbf_cache.rbf_changes();
            if rbf_changes.is_some() {
                rbf_trees = Some(rbf_cache.rbf_trees(false));
                full_rbf_trees = Some(rbf_cache.rbf_trees(true));
                rbf_summary = rbf_cache.latest_summary();
            }
        }

        for tx in &deleted {
            rbf_cache.evict(&tx.txid());
        }

        for tx in &deleted {
            mempool_src.remove_from_spend_map(&tx.tx.vin);
        }
        for tx in &added {
            mempool_src.add_to_spend_map(tx);
        }

        let mempool_blocks = templates.mempool_blocks();
        let block_deltas = templates.mempool_block_deltas();

        let mut updates: Vec<(String, Arc<str>)> = vec![
            ("mempoolInfo".to_string(), fragment(&mempool_info)),
            ("vBytesPerSecond".to_string(), fragment(&vbytes_per_second)),
            ("transactions".to_string(), fragment(&latest_transactions)),
            ("fees".to_string(), fragment(&fees)),
            ("mempool-blocks".to_string(), fragment(&mempool_blocks)),
        ];
        if let Some(da) = &da {
            updates.push(("da".to_string(), fragment(da)));
        }
        if let Some(summary) = &rbf_summary {
            updates.push(("rbfSummary".to_string(), fragment(summary)));
        }
        shared_snapshot().apply(updates);

        let added_index = build_address_index(&added);
        let deleted_index = build_address_index(&deleted);

        let sessions = session_snapshots(connected).await;
        let tracked: HashSet<Txid> =
            sessions.iter().filter_map(|(_, session)| session.track_tx).collect();
        let outspends = build_outspend_index(&tracked, &added);

        let in_sync = mempool_src.in_sync();
        let da_ready = da.as_ref().map_or(false, |d| d.previous_time.is_some());
        let mut cache = SerializationCache::seeded();

        if cfg.debug {
            eprintln!(
                "[fanout] mempool delta: size={} added={} deleted={} clients={}",
                mempool_size,
                added.len(),
                deleted.len(),
                sessions.len()
            );
        }

        for (client, session) in &sessions {
            let mut response = Response::new();

            if session.want_stats {
                for key in ["mempoolInfo", "vBytesPerSecond", "transactions"] {
                    if let Some(value) = cache.get(key) {
                        response.push(key, value);
                    }
                }
                if da_ready {
                    if let Some(value) = cache.get("da") {
                        response.push("da", value);
                    }
                }
                if let Some(value) = cache.get("fees") {
                    response.push("fees", value);
                }
            }
            if session.want_mempool_blocks {
                if let Some(value) = cache.get("mempool-blocks") {
                    response.push("mempool-blocks", value);
                }
            }
            if session.want_tomahawk {
                let health = cache.get_or_insert_with("tomahawk", || {
                    serde_json::to_string(&collab::node().health_status())
                        .unwrap_or_else(|_| "null".to_string())
                });
                response.push("tomahawk", health);
            }

            if let Some(awaited) = session.track_mempool_tx {
                if let Some(tx) = added.iter().find(|tx| tx.txid() == awaited) {
                    response.push("tx", fragment(&enriched_transaction(tx).await));
                    client.session.lock().await.track_mempool_tx = None;
                }
            }

            if let Some(canonical) = &session.track_address {
                let found = lookup(&added_index, &added, canonical);
                let removed = lookup(&deleted_index, &deleted, canonical);
                if !found.is_empty() {
                    response.push("address-transactions", fragment(&enrich_all(&found).await));
                }
                if !removed.is_empty() {
                    response.push("address-removed-transactions", fragment(&removed));
                }
            }

            if let Some(tracked_addresses) = &session.track_addresses {
                let mut payload: BTreeMap<&str, AddressActivity<'_>> = BTreeMap::new();
                for (raw, canonical) in tracked_addresses {
                    let found = lookup(&added_index, &added, canonical);
                    let removed = lookup(&deleted_index, &deleted, canonical);
                    if found.is_empty() && removed.is_empty() {
                        continue;
                    }
                    payload.insert(
                        raw.as_str(),
                        AddressActivity {
                            mempool: enrich_all(&found).await,
                            confirmed: Vec::new(),
                            removed: removed.into_iter().cloned().collect(),
                        },
                    );
                }
                if !payload.is_empty() {
                    response.push("multi-address-transactions", fragment(&payload));
                }
            }

            if let Some(scripts) = &session.track_scriptpubkeys {
                let mut payload: BTreeMap<&str, AddressActivity<'_>> = BTreeMap::new();
                for script in scripts {
                    let found = lookup(&added_index, &added, script);
                    let removed = lookup(&deleted_index, &deleted, script);
                    if found.is_empty() && removed.is_empty() {
                        continue;
                    }
                    payload.insert(
                        script.as_str(),
                        AddressActivity {
                            mempool: enrich_all(&found).await,
                            confirmed: Vec::new(),
                            removed: removed.into_iter().cloned().collect(),
                        },
                    );
                }
                if !payload.is_empty() {
                    response.push("multi-scriptpubkey-transactions", fragment(&payload));
                }
            }

            if let Some(asset) = &session.track_asset {
                let matching: Vec<&MempoolTransactionExtended> =
                    added.iter().filter(|tx| tx_touches_asset(&tx.tx, asset)).collect();
                if !matching.is_empty() {
                    response.push("address-transactions", fragment(&matching));
                }
            }

            if let Some(txid) = session.track_tx {
                if let Some(spent) = outspends.get(&txid) {
                    if !spent.is_empty() {
                        response.push("utxoSpent", fragment(spent));
                    }
                }
                if let Some((replacement, _)) = rbf_map
                    .iter()
                    .find(|(_, replaced)| replaced.iter().any(|tx| tx.txid() == txid))
                {
                    response.push(
                        "rbfTransaction",
                        fragment(&serde_json::json!({ "txid": replacement })),
                    );
                }
                if let Some(changes) = &rbf_changes {
                    if let Some(tree) =
                        changes.map.get(&txid).and_then(|root| changes.trees.get(root))
                    {
                        response.push("rbfInfo", fragment(tree));
                    }
                }
                if let Some(tx) = mempool.get(&txid) {
                    if let Some(position) = tx.position {
                        let cpfp = if tx.cpfp_dirty { tx.cpfp.clone() } else { None };
                        response.push(
                            "txPosition",
                            fragment(&TxPositionPayload { txid, position, cpfp }),
                        );
                    }
                }
            }

            if let (Some(index), true) = (session.track_mempool_block, in_sync) {
                if let Some(delta) = block_deltas.get(index) {
                    if !delta.added.is_empty()
                        || !delta.removed.is_empty()
                        || !delta.changed.is_empty()
                    {
                        let value =
                            cache.get_or_insert_with(&format!("projected-block-{index}"), || {
                                serde_json::to_string(&ProjectedBlockTransactions {
                                    index,
                                    block_transactions: None,
                                    delta: Some(delta.clone()),
                                })
                                .unwrap_or_else(|_| "null".to_string())
                            });
                        response.push("projected-block-transactions", value);
                    }
                }
            }

            match session.track_rbf {
                TrackRbf::All => {
                    if let Some(trees) = &rbf_trees {
                        response.push("rbfLatest", cache.serialize_once("rbfLatest", trees));
                    }
                }
                TrackRbf::FullRbf => {
                    if let Some(trees) = &full_rbf_trees {
                        response
                            .push("rbfLatest", cache.serialize_once("rbfLatest-full", trees));
                    }
                }
                TrackRbf::Off => {}
            }

            if session.track_rbf_summary {
                if let Some(summary) = &rbf_summary {
                    response
                        .push("rbfLatestSummary", cache.serialize_once("rbfSummary", summary));
                }
            }

            if let Some(message) = response.into_message() {
                client.send(message);
            }
        }
    }

    pub async fn handle_new_block(
        &mut self,
        connected: &[Arc<ClientHandle>],
        mut block: BlockExtended,
        txids: Vec<Txid>,
        transactions: Vec<TransactionExtended>,
    ) {
        debug_timer_log!("handle_new_block");
        let cfg = get_config();
        let mempool_src = collab::mempool();
        let templates = collab::templates();
        let rbf_cache = collab::rbf_cache();
        let mempool = mempool_src.mempool();

        if cfg.accelerations {
            for txid in &txids {
                let Some(tx) = mempool.get(txid) else { continue };
                if !tx.acceleration {
                    continue;
                }
                let boost_rate = (tx.effective_fee_per_vsize
                    - tx.tx.fee as f64 / tx.adjusted_vsize)
                    .max(0.0);
                if let Err(e) =
                    collab::repositories().save_acceleration(txid, &block, boost_rate).await
                {
                    eprintln!("[fanout] save acceleration for {txid} failed: {e:?}");
                }
            }
        }

        // Replacements resolved by inclusion.
        let spend_map = mempool_src.spend_map();
        let mined_rbf = find_mined_rbf_transactions(&transactions, &spend_map, &mempool);
        if !mined_rbf.is_empty() {
            mempool_src.handle_mined_rbf_transactions(&mined_rbf);
        }

        for tx in &transactions {
            mempool_src.remove_from_spend_map(&tx.vin);
        }

        if cfg.audit && mempool_src.in_sync() {
            // The audit algorithm may differ from the live one; then it runs
            // on a detached mempool copy so the live projection stays put.
            let projected = if cfg.advanced_gbt_audit && !cfg.advanced_gbt_mempool {
                match templates.project_blocks(mempool_src.cloned_mempool()).await {
                    Ok(projected) => projected,
                    Err(e) => {
                        eprintln!("[fanout] audit projection failed: {e:?}");
                        Vec::new()
                    }
                }
            } else {
                templates.mempool_blocks_with_transactions()
            };

            match collab::audit().audit_block(block.height, &txids, &transactions, &projected).await
            {
                Ok(audit) => {
                    let template = projected.first().cloned().unwrap_or_default();
                    if let Err(e) =
                        collab::repositories().save_template(block.height, &template).await
                    {
                        eprintln!("[fanout] save template at {} failed: {e:?}", block.height);
                    }
                    if let Err(e) = collab::repositories().save_audit(block.height, &audit).await
                    {
                        eprintln!("[fanout] save audit at {} failed: {e:?}", block.height);
                    }
                    block.extras.match_rate = Some((audit.score * 10000.0).round() / 100.0);
                    block.extras.expected_fees = Some(template.iter().map(|tx| tx.fee).sum());
                    block.extras.expected_weight =
                        Some(template.iter().map(|tx| (tx.vsize * 4.0) as u64).sum());
                    block.extras.similarity = block_similarity(&template, &txids);
                }
                Err(e) => eprintln!("[fanout] audit at {} failed: {e:?}", block.height),
            }
        }

        let mined_from_mempool: Vec<MempoolTransactionExtended> =
            txids.iter().filter_map(|txid| mempool.get(txid).cloned()).collect();
        mempool_src.remove_mined(&txids);
        for txid in &txids {
            rbf_cache.mined(txid);
        }

        if cfg.rust_gbt || cfg.advanced_gbt_mempool {
            if let Err(e) = templates.update_templates(&[], &mined_from_mempool, &[]).await {
                eprintln!("[fanout] template update failed: {e:?}");
            }
        } else {
            let post_mempool = mempool_src.mempool();
            if let Err(e) = templates.make_templates(&post_mempool).await {
                eprintln!("[fanout] template rebuild failed: {e:?}");
            }
        }

        if self.blocks.is_empty() {
            self.blocks = collab::blocks_api().blocks();
        }
        match self.blocks.iter_mut().find(|known| known.id == block.id) {
            Some(known) => *known = block.clone(),
            None => self.blocks.push(block.clone()),
        }
        if self.blocks.len() > cfg.initial_blocks_amount {
            let excess = self.blocks.len() - cfg.initial_blocks_amount;
            self.blocks.drain(..excess);
        }

        let mempool_info = mempool_src.mempool_info();
        let mempool_blocks = templates.mempool_blocks();
        let block_deltas = templates.mempool_block_deltas();
        let projected_full = templates.mempool_blocks_with_transactions();
        let da = collab::difficulty().difficulty_adjustment();
        let fees = collab::fees().recommended_fees();
        let loading = collab::loading_indicators().loading_indicators();

        let mut updates: Vec<(String, Arc<str>)> = vec![
            ("mempoolInfo".to_string(), fragment(&mempool_info)),
            ("blocks".to_string(), fragment(&self.blocks)),
            ("mempool-blocks".to_string(), fragment(&mempool_blocks)),
            ("loadingIndicators".to_string(), fragment(&loading)),
            ("fees".to_string(), fragment(&fees)),
        ];
        if let Some(da) = &da {
            updates.push(("da".to_string(), fragment(da)));
        }
        shared_snapshot().apply(updates);

        let block_index = build_address_index(&transactions);
        let sessions = session_snapshots(connected).await;
        let mined_set: HashSet<Txid> = txids.iter().copied().collect();
        let post_mempool = mempool_src.mempool();
        let in_sync = mempool_src.in_sync();
        let mut cache = SerializationCache::seeded();

        if cfg.debug {
            eprintln!(
                "[fanout] block {} height={} txs={} clients={}",
                block.id,
                block.height,
                transactions.len(),
                sessions.len()
            );
        }

        for (client, session) in &sessions {
            let mut response = Response::new();

            if session.want_blocks {
                response.push("block", cache.serialize_once("block", &block));
            }
            if session.want_stats {
                for key in ["mempoolInfo", "vBytesPerSecond", "fees", "da"] {
                    if let Some(value) = cache.get(key) {
                        response.push(key, value);
                    }
                }
            }
            if session.want_mempool_blocks {
                if let Some(value) = cache.get("mempool-blocks") {
                    response.push("mempool-blocks", value);
                }
            }
            if session.want_tomahawk {
                let health = cache.get_or_insert_with("tomahawk", || {
                    serde_json::to_string(&collab::node().health_status())
                        .unwrap_or_else(|_| "null".to_string())
                });
                response.push("tomahawk", health);
            }

            if let Some(txid) = session.track_tx {
                if mined_set.contains(&txid) {
                    response.push("txConfirmed", fragment(&txid));
                } else if let Some(tx) = post_mempool.get(&txid) {
                    if let Some(position) = tx.position {
                        let cpfp = if tx.cpfp_dirty { tx.cpfp.clone() } else { None };
                        response.push(
                            "txPosition",
                            fragment(&TxPositionPayload { txid, position, cpfp }),
                        );
                    }
                }
            }

            if let Some(canonical) = &session.track_address {
                let found = lookup(&block_index, &transactions, canonical);
                if !found.is_empty() {
                    let stamped: Vec<StampedTransaction<'_>> =
                        found.into_iter().map(|tx| stamp(tx, &block)).collect();
                    response.push("block-transactions", fragment(&stamped));
                }
            }

            if let Some(tracked_addresses) = &session.track_addresses {
                let mut payload: BTreeMap<&str, AddressActivity<'_>> = BTreeMap::new();
                for (raw, canonical) in tracked_addresses {
                    let found = lookup(&block_index, &transactions, canonical);
                    if found.is_empty() {
                        continue;
                    }
                    payload.insert(
                        raw.as_str(),
                        AddressActivity {
                            mempool: Vec::new(),
                            confirmed: found.into_iter().map(|tx| stamp(tx, &block)).collect(),
                            removed: Vec::new(),
                        },
                    );
                }
                if !payload.is_empty() {
                    response.push("multi-address-transactions", fragment(&payload));
                }
            }

            if let Some(scripts) = &session.track_scriptpubkeys {
                let mut payload: BTreeMap<&str, AddressActivity<'_>> = BTreeMap::new();
                for script in scripts {
                    let found = lookup(&block_index, &transactions, script);
                    if found.is_empty() {
                        continue;
                    }
                    payload.insert(
                        script.as_str(),
                        AddressActivity {
                            mempool: Vec::new(),
                            confirmed: found.into_iter().map(|tx| stamp(tx, &block)).collect(),
                            removed: Vec::new(),
                        },
                    );
                }
                if !payload.is_empty() {
                    response.push("multi-scriptpubkey-transactions", fragment(&payload));
                }
            }

            if let Some(asset) = &session.track_asset {
                let matching: Vec<StampedTransaction<'_>> = transactions
                    .iter()
                    .filter(|tx| tx_touches_asset(tx, asset))
                    .map(|tx| stamp(tx, &block))
                    .collect();
                if !matching.is_empty() {
                    response.push("block-transactions", fragment(&matching));
                }
            }

            if let (Some(index), true) = (session.track_mempool_block, in_sync) {
                if let Some(delta) = block_deltas.get(index) {
                    // A delta larger than half the block is dearer than just
                    // resending the whole projected list.
                    let value = if delta.added.len() <= transactions.len() / 2 {
                        cache.get_or_insert_with(&format!("projected-block-{index}"), || {
                            serde_json::to_string(&ProjectedBlockTransactions {
                                index,
                                block_transactions: None,
                                delta: Some(delta.clone()),
                            })
                            .unwrap_or_else(|_| "null".to_string())
                        })
                    } else {
                        cache.get_or_insert_with(&format!("projected-block-full-{index}"), || {
                            serde_json::to_string(&ProjectedBlockTransactions {
                                index,
                                block_transactions: Some(
                                    projected_full.get(index).cloned().unwrap_or_default(),
                                ),
                                delta: None,
                            })
                            .unwrap_or_else(|_| "null".to_string())
                        })
                    };
                    response.push("projected-block-transactions", value);
                }
            }

            if let Some(message) = response.into_message() {
                client.send(message);
            }
        }
    }

    pub async fn handle_reorg(&mut self, connected: &[Arc<ClientHandle>]) {
        debug_timer_log!("handle_reorg");
        self.blocks = collab::blocks_api().blocks();
        let cap = get_config().initial_blocks_amount;
        if self.blocks.len() > cap {
            let excess = self.blocks.len() - cap;
            self.blocks.drain(..excess);
        }
        let da = collab::difficulty().difficulty_adjustment();

        let blocks_fragment = fragment(&self.blocks);
        let da_fragment = da.as_ref().map(fragment);

        let mut updates: Vec<(String, Arc<str>)> =
            vec![("blocks".to_string(), blocks_fragment.clone())];
        if let Some(da) = &da_fragment {
            updates.push(("da".to_string(), da.clone()));
        }
        shared_snapshot().apply(updates);

        for (client, session) in &session_snapshots(connected).await {
            let mut response = Response::new();
            if session.want_blocks {
                response.push("blocks", blocks_fragment.clone());
            }
            if session.want_stats {
                if let Some(da) = &da_fragment {
                    response.push("da", da.clone());
                }
            }
            if let Some(message) = response.into_message() {
                client.send(message);
            }
        }
    }

    pub async fn handle_loading_changed(
        &self,
        connected: &[Arc<ClientHandle>],
        indicators: BTreeMap<String, f64>,
    ) {
        let value = fragment(&indicators);
        shared_snapshot().set("loadingIndicators", value.clone());
        let message = join_serialized([("loadingIndicators", value.as_ref())]);
        for client in connected {
            client.send(message.clone());
        }
    }

    pub async fn handle_price_updated(&self, connected: &[Arc<ClientHandle>], prices: Prices) {
        let value = fragment(&prices);
        shared_snapshot().set("conversions", value.clone());
        let message = join_serialized([("conversions", value.as_ref())]);
        for client in connected {
            client.send(message.clone());
        }
    }

    pub async fn handle_new_statistic(
        &self,
        connected: &[Arc<ClientHandle>],
        statistic: LiveStatistic,
    ) {
        let message = join_serialized([("live-2h-chart", fragment(&statistic).as_ref())]);
        for (client, session) in &session_snapshots(connected).await {
            if session.want_live_chart {
                client.send(message.clone());
            }
        }
    }

    pub async fn handle_donation_confirmed(
        &self,
        connected: &[Arc<ClientHandle>],
        donation_id: &str,
    ) {
        let message = join_serialized([("donationConfirmed", "true")]);
        for (client, session) in &session_snapshots(connected).await {
            if session.track_donation.as_deref() == Some(donation_id) {
                client.send(message.clone());
            }
        }
    }
}

impl Default for FanoutEngine {
    fn default() -> Self {
        Self::new()
    }
}
