use crate::schemas::HasTransaction;
use std::collections::{HashMap, HashSet};

fn is_base58_char(c: char) -> bool {
    matches!(c, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z' | 'a'..='k' | 'm'..='z')
}

// bech32 data charset minus the separator-adjacent ambiguous characters.
fn is_bech32_data_char(c: char) -> bool {
    matches!(c, 'a' | 'c'..='h' | 'j'..='n' | 'p'..='z' | '0' | '2'..='9')
}

fn is_hex_str(s: &str) -> bool {
    !s.is_empty() && hex::decode(s).is_ok()
}

fn is_base58_legacy(s: &str) -> bool {
    let len = s.len();
    ((26..=35).contains(&len) || len == 80) && s.chars().all(is_base58_char)
}

fn is_bech32(s: &str, upper: bool) -> bool {
    let Some(sep) = s.find('1') else { return false };
    if !(2..=5).contains(&sep) {
        return false;
    }
    let (hrp, rest) = s.split_at(sep);
    let data = &rest[1..];
    if !(8..=100).contains(&data.len()) {
        return false;
    }
    let hrp_ok = if upper {
        hrp.chars().all(|c| c.is_ascii_uppercase())
    } else {
        hrp.chars().all(|c| c.is_ascii_lowercase())
    };
    let data_ok = if upper {
        data.chars().all(|c| is_bech32_data_char(c.to_ascii_lowercase()) && !c.is_ascii_lowercase())
    } else {
        data.chars().all(is_bech32_data_char)
    };
    hrp_ok && data_ok
}

// Canonical P2PK output scripts as produced below; accepting them keeps the
// canonicalizer idempotent on its own output.
fn is_p2pk_script(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    (lower.len() == 134 && lower.starts_with("4104") && lower.ends_with("ac")
        || lower.len() == 70
            && (lower.starts_with("2102") || lower.starts_with("2103"))
            && lower.ends_with("ac"))
        && is_hex_str(&lower)
}

/// Canonicalize a tracked address handle, or reject it. Uppercase bech32 is
/// lowercased; raw public keys become their P2PK output script; everything
/// else that classifies passes through unchanged.
pub fn canonicalize_address(input: &str) -> Option<String> {
    if is_base58_legacy(input) || is_bech32(input, false) {
        return Some(input.to_string());
    }
    if is_bech32(input, true) {
        return Some(input.to_ascii_lowercase());
    }
    if input.len() == 130 && input.starts_with("04") && is_hex_str(input) {
        return Some(format!("41{}ac", input.to_ascii_lowercase()));
    }
    if input.len() == 66
        && (input.starts_with("02") || input.starts_with("03"))
        && is_hex_str(input)
    {
        return Some(format!("21{}ac", input.to_ascii_lowercase()));
    }
    if is_p2pk_script(input) {
        return Some(input.to_ascii_lowercase());
    }
    None
}

/// Canonicalize a tracked raw output script: hex, stored lowercase.
pub fn canonicalize_scriptpubkey(input: &str) -> Option<String> {
    if is_hex_str(input) {
        Some(input.to_ascii_lowercase())
    } else {
        None
    }
}

/// Map every address / script-pubkey touched by a batch of transactions to
/// the indices of the touching transactions. Pure; built fresh per event.
pub fn build_address_index<T: HasTransaction>(txs: &[T]) -> HashMap<String, Vec<usize>> {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, entry) in txs.iter().enumerate() {
        let tx = entry.transaction();
        let mut keys: HashSet<&str> = HashSet::new();
        for vout in &tx.vout {
            keys.insert(vout.scriptpubkey.as_str());
            if let Some(address) = &vout.scriptpubkey_address {
                keys.insert(address.as_str());
            }
        }
        for vin in &tx.vin {
            if let Some(prevout) = &vin.prevout {
                keys.insert(prevout.scriptpubkey.as_str());
                if let Some(address) = &prevout.scriptpubkey_address {
                    keys.insert(address.as_str());
                }
            }
        }
        for key in keys {
            index.entry(key.to_string()).or_default().push(i);
        }
    }
    index
}
