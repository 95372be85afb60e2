//! End-of-run exports: trade ledger and equity curve as CSV.

use std::path::Path;

use crate::models::{EquitySnapshot, Trade};

/// Write the trade ledger, replacing any previous export.
pub fn write_trades_csv(path: impl AsRef<Path>, trades: &[Trade]) -> crate::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the equity curve, replacing any previous export.
pub fn write_equity_csv(path: impl AsRef<Path>, snapshots: &[EquitySnapshot]) -> crate::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for snapshot in snapshots {
        writer.serialize(snapshot)?;
    }
    writer.flush()?;
    Ok(())
}
