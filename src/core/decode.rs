use crate::collab;
use crate::collab::node::enriched_transaction;
use crate::config::get_config;
use crate::consts::DONATION_ID_LEN;
use crate::core::address::{canonicalize_address, canonicalize_scriptpubkey};
use crate::core::session::{ClientSession, TrackRbf};
use crate::core::snapshot::{fragment, shared_snapshot, Response};
use crate::schemas::{ProjectedBlockTransactions, TxPositionPayload};
use anyhow::{Context, Result};
use bitcoin::Txid;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

const WANT_CLASSES: [&str; 5] =
    ["blocks", "mempool-blocks", "live-2h-chart", "stats", "tomahawk"];

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn is_hex_64(s: &str) -> bool {
    s.len() == 64 && hex::decode(s).is_ok()
}

fn is_market_pair(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 7
        && bytes[3] == b'_'
        && bytes[..3].iter().all(u8::is_ascii_lowercase)
        && bytes[4..].iter().all(u8::is_ascii_lowercase)
}

/// Process one inbound frame against the session. Returns the messages to
/// send, in order. An error means the frame was malformed and the caller
/// closes the connection; validator rejections only clear slots.
pub async fn handle_frame(session: &mut ClientSession, raw: &str) -> Result<Vec<String>> {
    let frame: Value = serde_json::from_str(raw).context("malformed frame")?;
    let snapshot = shared_snapshot();
    let mut response = Response::new();
    let mut sends: Vec<String> = Vec::new();

    let action = frame.get("action").and_then(Value::as_str);

    // `want`: classes not listed are turned off; remember which ones turned
    // on with this frame so their snapshot seed goes out once.
    let mut want_now: HashSet<&str> = HashSet::new();
    if action == Some("want") {
        let data = frame
            .get("data")
            .and_then(Value::as_array)
            .context("want data must be an array")?;
        let wanted: HashSet<&str> = data.iter().filter_map(Value::as_str).collect();
        for class in WANT_CLASSES {
            let on = wanted.contains(class);
            let was = match class {
                "blocks" => session.want_blocks,
                "mempool-blocks" => session.want_mempool_blocks,
                "live-2h-chart" => session.want_live_chart,
                "stats" => session.want_stats,
                _ => session.want_tomahawk,
            };
            if on && !was {
                want_now.insert(class);
            }
            match class {
                "blocks" => session.want_blocks = on,
                "mempool-blocks" => session.want_mempool_blocks = on,
                "live-2h-chart" => session.want_live_chart = on,
                "stats" => session.want_stats = on,
                _ => session.want_tomahawk = on,
            }
        }
    }

    if want_now.contains("blocks") || truthy(frame.get("refresh-blocks")) {
        if let Some(blocks) = snapshot.get("blocks") {
            response.push("blocks", blocks);
        }
    }
    if want_now.contains("mempool-blocks") {
        if let Some(mempool_blocks) = snapshot.get("mempool-blocks") {
            response.push("mempool-blocks", mempool_blocks);
        }
    }
    if want_now.contains("stats") {
        for key in ["mempoolInfo", "vBytesPerSecond", "fees", "da"] {
            if let Some(value) = snapshot.get(key) {
                response.push(key.to_string(), value);
            }
        }
    }
    if want_now.contains("tomahawk") {
        response.push("tomahawk", fragment(&collab::node().health_status()));
    }

    if let Some(value) = frame.get("track-tx") {
        match value.as_str().and_then(|s| Txid::from_str(s).ok()) {
            Some(txid) => {
                session.track_tx = Some(txid);
                let mempool = collab::mempool().mempool();
                if truthy(frame.get("watch-mempool")) {
                    if let Some(replacement) = collab::rbf_cache().replaced_by(&txid) {
                        response.push(
                            "txReplaced",
                            fragment(&serde_json::json!({ "txid": replacement })),
                        );
                        session.track_tx = None;
                    } else if let Some(tx) = mempool.get(&txid) {
                        response.push("tx", fragment(&enriched_transaction(tx).await));
                    } else {
                        // Not seen yet; deliver on its first mempool sighting.
                        session.track_mempool_tx = Some(txid);
                    }
                }
                if let Some(position) = mempool.get(&txid).and_then(|tx| tx.position) {
                    response.push(
                        "txPosition",
                        fragment(&TxPositionPayload { txid, position, cpfp: None }),
                    );
                }
            }
            None => session.track_tx = None,
        }
    }

    if let Some(value) = frame.get("track-address") {
        session.track_address = value.as_str().and_then(canonicalize_address);
    }

    if let Some(value) = frame.get("track-addresses") {
        session.track_addresses = None;
        let max = get_config().max_tracked_addresses;
        match value.as_array() {
            Some(list) if list.len() > max => {
                response.push(
                    "track-addresses-error",
                    fragment(&format!(
                        "too many addresses requested: {} (max {max})",
                        list.len()
                    )),
                );
            }
            Some(list) => {
                let mut tracked: BTreeMap<String, String> = BTreeMap::new();
                let mut error: Option<String> = None;
                for item in list {
                    let raw_address = item.as_str().unwrap_or_default();
                    match canonicalize_address(raw_address) {
                        Some(canonical) => {
                            tracked.insert(raw_address.to_string(), canonical);
                        }
                        None => {
                            error = Some(format!("\"{raw_address}\" is not a valid address"));
                            break;
                        }
                    }
                }
                match error {
                    Some(message) => {
                        response.push("track-addresses-error", fragment(&message))
                    }
                    None => session.track_addresses = Some(tracked),
                }
            }
            None => {
                response.push(
                    "track-addresses-error",
                    fragment(&"track-addresses requires an array of addresses"),
                );
            }
        }
    }

    if let Some(value) = frame.get("track-scriptpubkeys") {
        session.track_scriptpubkeys = None;
        let max = get_config().max_tracked_addresses;
        match value.as_array() {
            Some(list) if list.len() > max => {
                response.push(
                    "track-scriptpubkeys-error",
                    fragment(&format!(
                        "too many scriptpubkeys requested: {} (max {max})",
                        list.len()
                    )),
                );
            }
            Some(list) => {
                let mut tracked: Vec<String> = Vec::new();
                let mut error: Option<String> = None;
                for item in list {
                    let raw_script = item.as_str().unwrap_or_default();
                    match canonicalize_scriptpubkey(raw_script) {
                        Some(canonical) => tracked.push(canonical),
                        None => {
                            error =
                                Some(format!("\"{raw_script}\" is not a valid scriptpubkey"));
                            break;
                        }
                    }
                }
                match error {
                    Some(message) => {
                        response.push("track-scriptpubkeys-error", fragment(&message))
                    }
                    None => session.track_scriptpubkeys = Some(tracked),
                }
            }
            None => {
                response.push(
                    "track-scriptpubkeys-error",
                    fragment(&"track-scriptpubkeys requires an array of scripts"),
                );
            }
        }
    }

    if let Some(value) = frame.get("track-asset") {
        session.track_asset = value
            .as_str()
            .filter(|s| is_hex_64(s))
            .map(|s| s.to_ascii_lowercase());
    }

    if let Some(value) = frame.get("track-mempool-block") {
        match value.as_u64() {
            Some(index) => {
                let index = index as usize;
                session.track_mempool_block = Some(index);
                let projected = collab::templates().mempool_blocks_with_transactions();
                let block_transactions = projected.get(index).cloned().unwrap_or_default();
                response.push(
                    "projected-block-transactions",
                    fragment(&ProjectedBlockTransactions {
                        index,
                        block_transactions: Some(block_transactions),
                        delta: None,
                    }),
                );
            }
            None => session.track_mempool_block = None,
        }
    }

    if let Some(value) = frame.get("track-rbf") {
        session.track_rbf =
            value.as_str().map(TrackRbf::parse).unwrap_or(TrackRbf::Off);
        match session.track_rbf {
            TrackRbf::All => {
                response.push("rbfLatest", fragment(&collab::rbf_cache().rbf_trees(false)))
            }
            TrackRbf::FullRbf => {
                response.push("rbfLatest", fragment(&collab::rbf_cache().rbf_trees(true)))
            }
            TrackRbf::Off => {}
        }
    }

    if let Some(value) = frame.get("track-rbf-summary") {
        session.track_rbf_summary = value.as_bool().unwrap_or(false);
        if session.track_rbf_summary {
            if let Some(summary) = snapshot.get("rbfSummary") {
                response.push("rbfLatestSummary", summary);
            }
        }
    }

    if let Some(value) = frame.get("track-donation") {
        session.track_donation = value
            .as_str()
            .filter(|s| s.chars().count() == DONATION_ID_LEN)
            .map(str::to_string);
    }

    if let Some(value) = frame.get("track-bisq-market") {
        session.track_bisq_market =
            value.as_str().filter(|s| is_market_pair(s)).map(str::to_string);
    }

    if action == Some("init") {
        refresh_missing_init_fields();
        if snapshot.has_blocks() {
            sends.push(snapshot.init_blob().to_string());
        }
    }

    if action == Some("ping") {
        response.push("pong", Arc::from("true"));
    }

    if let Some(message) = response.into_message() {
        sends.push(message);
    }

    Ok(sends)
}

/// `init` must never serve a half-empty snapshot: pull any missing base
/// fields from their collaborators first.
fn refresh_missing_init_fields() {
    let snapshot = shared_snapshot();
    let mut updates: Vec<(String, Arc<str>)> = Vec::new();

    if !snapshot.contains("blocks") {
        let mut blocks = collab::blocks_api().blocks();
        let cap = get_config().initial_blocks_amount;
        if blocks.len() > cap {
            blocks.drain(..blocks.len() - cap);
        }
        updates.push(("blocks".to_string(), fragment(&blocks)));
    }
    if !snapshot.contains("da") {
        if let Some(da) = collab::difficulty().difficulty_adjustment() {
            updates.push(("da".to_string(), fragment(&da)));
        }
    }
    if !snapshot.contains("backendInfo") {
        updates.push(("backendInfo".to_string(), fragment(&collab::backend_info().backend_info())));
    }
    if !snapshot.contains("conversions") {
        updates.push(("conversions".to_string(), fragment(&collab::prices().latest_prices())));
    }

    if !updates.is_empty() {
        snapshot.apply(updates);
    }
}
