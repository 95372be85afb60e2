//! SPL transfer extraction from `getTransaction` (jsonParsed) payloads.

use serde_json::Value;

use crate::models::TransferRecord;

/// Pull SPL token transfers out of a parsed transaction payload.
///
/// Only `transfer` / `transferChecked` instructions from the token program
/// are considered. Instructions without a mint are dropped; a record whose
/// amount cannot be resolved is kept with `ui_amount: None`.
pub fn extract_spl_transfers(tx: &Value) -> Vec<TransferRecord> {
    let mut out = Vec::new();

    let Some(instructions) = tx
        .pointer("/transaction/message/instructions")
        .and_then(Value::as_array)
    else {
        return out;
    };

    for ix in instructions {
        let program = ix.get("program").and_then(Value::as_str);
        if !matches!(program, Some("spl-token") | Some("token")) {
            continue;
        }

        let Some(parsed) = ix.get("parsed").filter(|p| p.is_object()) else {
            continue;
        };
        let ix_type = parsed.get("type").and_then(Value::as_str);
        if !matches!(ix_type, Some("transfer") | Some("transferChecked")) {
            continue;
        }

        let info = match parsed.get("info") {
            Some(info) => info,
            None => continue,
        };
        let Some(mint) = info.get("mint").and_then(Value::as_str) else {
            continue;
        };

        out.push(TransferRecord {
            mint: mint.to_string(),
            source: info
                .get("source")
                .and_then(Value::as_str)
                .map(str::to_string),
            destination: info
                .get("destination")
                .and_then(Value::as_str)
                .map(str::to_string),
            ui_amount: parse_ui_amount(info),
        });
    }

    out
}

// `transferChecked` carries a tokenAmount object with a precomputed
// uiAmount; plain `transfer` has a raw amount string plus, sometimes,
// a decimals field to scale it with.
fn parse_ui_amount(info: &Value) -> Option<f64> {
    if let Some(token_amount) = info.get("tokenAmount") {
        if let Some(ui) = token_amount.get("uiAmount").and_then(Value::as_f64) {
            return Some(ui);
        }
        let raw = parse_raw_amount(token_amount.get("amount"))?;
        let decimals = token_amount.get("decimals").and_then(Value::as_u64)?;
        return Some(raw / 10f64.powi(decimals as i32));
    }

    let raw = parse_raw_amount(info.get("amount"))?;
    let decimals = info.get("decimals").and_then(Value::as_u64)?;
    Some(raw / 10f64.powi(decimals as i32))
}

fn parse_raw_amount(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
