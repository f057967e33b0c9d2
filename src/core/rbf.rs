use crate::schemas::{MempoolTransactionExtended, OutspendRef, TransactionExtended};
use bitcoin::Txid;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Replacements inside a mempool delta: an added transaction that spends an
/// outpoint some deleted transaction also spent has replaced it. Keyed by
/// the replacement txid.
pub fn find_rbf_transactions(
    added: &[MempoolTransactionExtended],
    deleted: &[MempoolTransactionExtended],
) -> HashMap<Txid, Vec<MempoolTransactionExtended>> {
    let mut replacements: HashMap<Txid, Vec<MempoolTransactionExtended>> = HashMap::new();
    if added.is_empty() || deleted.is_empty() {
        return replacements;
    }

    let mut spent_by_deleted: HashMap<(Txid, u32), &MempoolTransactionExtended> = HashMap::new();
    for tx in deleted {
        for vin in &tx.tx.vin {
            spent_by_deleted.insert((vin.txid, vin.vout), tx);
        }
    }

    for tx in added {
        let mut replaced: Vec<MempoolTransactionExtended> = Vec::new();
        let mut seen: HashSet<Txid> = HashSet::new();
        for vin in &tx.tx.vin {
            if let Some(old) = spent_by_deleted.get(&(vin.txid, vin.vout)) {
                if seen.insert(old.txid()) {
                    replaced.push((*old).clone());
                }
            }
        }
        if !replaced.is_empty() {
            replacements.insert(tx.txid(), replaced);
        }
    }

    replacements
}

/// Replacements resolved by a block: a mined transaction that spends an
/// outpoint a still-unconfirmed mempool transaction also spends has replaced
/// it. Keyed by the mined txid.
pub fn find_mined_rbf_transactions(
    block_transactions: &[TransactionExtended],
    spend_map: &HashMap<(Txid, u32), Txid>,
    mempool: &HashMap<Txid, MempoolTransactionExtended>,
) -> HashMap<Txid, Vec<MempoolTransactionExtended>> {
    let mined: HashSet<Txid> = block_transactions.iter().map(|tx| tx.txid).collect();
    let mut replacements: HashMap<Txid, Vec<MempoolTransactionExtended>> = HashMap::new();

    for tx in block_transactions {
        let mut replaced: Vec<MempoolTransactionExtended> = Vec::new();
        let mut seen: HashSet<Txid> = HashSet::new();
        for vin in &tx.vin {
            if let Some(spender) = spend_map.get(&(vin.txid, vin.vout)) {
                if *spender == tx.txid || mined.contains(spender) {
                    continue;
                }
                if let Some(unconfirmed) = mempool.get(spender) {
                    if seen.insert(*spender) {
                        replaced.push(unconfirmed.clone());
                    }
                }
            }
        }
        if !replaced.is_empty() {
            replacements.insert(tx.txid, replaced);
        }
    }

    replacements
}

/// For every tracked txid, which of its outputs an added transaction spends:
/// `{srcTxid: {voutIdx: {vin, txid}}}`.
pub fn build_outspend_index(
    tracked: &HashSet<Txid>,
    added: &[MempoolTransactionExtended],
) -> HashMap<Txid, BTreeMap<u32, OutspendRef>> {
    let mut outspends: HashMap<Txid, BTreeMap<u32, OutspendRef>> = HashMap::new();
    if tracked.is_empty() {
        return outspends;
    }
    for tx in added {
        for (vin_index, vin) in tx.tx.vin.iter().enumerate() {
            if tracked.contains(&vin.txid) {
                outspends
                    .entry(vin.txid)
                    .or_default()
                    .insert(vin.vout, OutspendRef { vin: vin_index, txid: tx.txid() });
            }
        }
    }
    outspends
}
