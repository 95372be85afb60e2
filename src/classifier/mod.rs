// Transfer-to-signal classification.

use crate::models::{ChainEvent, Signal, TransferRecord};

pub const WHALE_THRESHOLD: f64 = 10.0;
pub const LARGE_THRESHOLD: f64 = 1.0;

/// Classifier output for a transaction that moved at least one token.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub signal: Signal,
    pub transfer_count: usize,
    pub top_mint: String,
    pub top_amount: f64,
    pub total_amount: f64,
    pub dominance: f64,
}

impl Classification {
    /// Merge the classifier fields into a chain event.
    pub fn stamp(self, event: &mut ChainEvent) {
        event.signal = Some(self.signal);
        event.transfer_count = Some(self.transfer_count);
        event.top_mint = Some(self.top_mint);
        event.top_amount = Some(self.top_amount);
        event.total_amount = Some(self.total_amount);
        event.dominance = Some(self.dominance);
    }
}

/// Reduce a transaction's transfer list to a single signal.
///
/// The top transfer is the one with the largest absolute amount (ties keep
/// the earliest occurrence); dominance is its share of the total amount
/// moved. Returns `None` when nothing usable was transferred.
pub fn classify_transfers(transfers: &[TransferRecord]) -> Option<Classification> {
    let cleaned: Vec<(&str, f64)> = transfers
        .iter()
        .filter(|t| !t.mint.is_empty())
        .map(|t| (t.mint.as_str(), t.ui_amount.unwrap_or(0.0).abs()))
        .collect();

    let (mut top_mint, mut top_amount) = *cleaned.first()?;
    let mut total = 0.0;
    for &(mint, amount) in &cleaned {
        total += amount;
        if amount > top_amount {
            top_mint = mint;
            top_amount = amount;
        }
    }

    let dominance = if total > 0.0 { top_amount / total } else { 0.0 };

    let signal = if top_amount >= WHALE_THRESHOLD {
        Signal::WhaleActivity
    } else if top_amount >= LARGE_THRESHOLD {
        Signal::LargeTransfer
    } else {
        Signal::NormalTransfer
    };

    Some(Classification {
        signal,
        transfer_count: cleaned.len(),
        top_mint: top_mint.to_string(),
        top_amount,
        total_amount: total,
        dominance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(mint: &str, ui_amount: f64) -> TransferRecord {
        TransferRecord {
            mint: mint.to_string(),
            source: None,
            destination: None,
            ui_amount: Some(ui_amount),
        }
    }

    #[test]
    fn test_top_transfer_and_dominance() {
        let transfers = vec![transfer("X", 3.0), transfer("X", 7.0)];
        let c = classify_transfers(&transfers).unwrap();

        assert_eq!(c.top_mint, "X");
        assert_eq!(c.top_amount, 7.0);
        assert_eq!(c.total_amount, 10.0);
        assert_eq!(c.dominance, 0.7);
        assert_eq!(c.signal, Signal::LargeTransfer);
        assert_eq!(c.transfer_count, 2);
    }

    #[test]
    fn test_empty_list_is_no_transfers() {
        assert!(classify_transfers(&[]).is_none());
    }

    #[test]
    fn test_mintless_records_are_no_transfers() {
        let transfers = vec![TransferRecord {
            mint: String::new(),
            source: None,
            destination: None,
            ui_amount: Some(5.0),
        }];

        assert!(classify_transfers(&transfers).is_none());
    }

    #[test]
    fn test_tie_keeps_first_occurrence() {
        let transfers = vec![transfer("First", 5.0), transfer("Second", 5.0)];
        let c = classify_transfers(&transfers).unwrap();

        assert_eq!(c.top_mint, "First");
        assert_eq!(c.dominance, 0.5);
    }

    #[test]
    fn test_amounts_use_absolute_value() {
        let transfers = vec![transfer("X", -12.0), transfer("Y", 4.0)];
        let c = classify_transfers(&transfers).unwrap();

        assert_eq!(c.top_mint, "X");
        assert_eq!(c.top_amount, 12.0);
        assert_eq!(c.total_amount, 16.0);
        assert_eq!(c.signal, Signal::WhaleActivity);
    }

    #[test]
    fn test_threshold_boundaries() {
        let c = classify_transfers(&[transfer("X", 10.0)]).unwrap();
        assert_eq!(c.signal, Signal::WhaleActivity);

        let c = classify_transfers(&[transfer("X", 1.0)]).unwrap();
        assert_eq!(c.signal, Signal::LargeTransfer);

        let c = classify_transfers(&[transfer("X", 0.99)]).unwrap();
        assert_eq!(c.signal, Signal::NormalTransfer);
    }

    #[test]
    fn test_zero_total_has_zero_dominance() {
        let transfers = vec![TransferRecord {
            mint: "X".to_string(),
            source: None,
            destination: None,
            ui_amount: None,
        }];
        let c = classify_transfers(&transfers).unwrap();

        assert_eq!(c.top_amount, 0.0);
        assert_eq!(c.dominance, 0.0);
        assert_eq!(c.signal, Signal::NormalTransfer);
    }

    #[test]
    fn test_dominance_stays_in_unit_interval() {
        let transfers = vec![
            transfer("A", 0.25),
            transfer("B", 2.5),
            transfer("C", 250.0),
        ];
        let c = classify_transfers(&transfers).unwrap();

        assert!(c.dominance >= 0.0 && c.dominance <= 1.0);
    }

    #[test]
    fn test_stamp_fills_event_fields() {
        let mut event = ChainEvent::default();
        let c = classify_transfers(&[transfer("X", 3.0), transfer("X", 7.0)]).unwrap();
        c.stamp(&mut event);

        assert_eq!(event.signal, Some(Signal::LargeTransfer));
        assert_eq!(event.top_mint.as_deref(), Some("X"));
        assert_eq!(event.top_amount, Some(7.0));
        assert_eq!(event.total_amount, Some(10.0));
        assert_eq!(event.dominance, Some(0.7));
        assert_eq!(event.transfer_count, Some(2));
    }
}
