//! Credit, debit and net totals over a transaction snapshot.

use crate::model::{Direction, Transaction};
use rust_decimal::Decimal;
use std::fmt;

/// Decimal places shown to users.
const DISPLAY_DP: u32 = 2;

/// Totals for one ledger.
///
/// Always derived from a full transaction set; never kept as a running
/// value, so it matches whatever snapshot it was computed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Balance {
    pub credit: Decimal,
    pub debit: Decimal,
    /// `credit - debit`.
    pub balance: Decimal,
}

impl Balance {
    /// Totals rounded for display, e.g. `("100.00", "40.00", "60.00")`.
    pub fn display(&self) -> BalanceDisplay {
        BalanceDisplay {
            credit: format_amount(self.credit),
            debit: format_amount(self.debit),
            balance: format_amount(self.balance),
        }
    }
}

/// [Balance] rendered at display precision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceDisplay {
    pub credit: String,
    pub debit: String,
    pub balance: String,
}

impl fmt::Display for BalanceDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Credit: {} | Debit: {} | Balance: {}",
            self.credit, self.debit, self.balance
        )
    }
}

/// Round to display precision, half away from zero.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(
        DISPLAY_DP,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    );
    format!("{:.2}", rounded)
}

/// Sum a transaction set exactly.
///
/// Totals saturate at [Decimal::MAX] instead of overflowing; amounts under
/// [MAX_AMOUNT](crate::model::MAX_AMOUNT) never get near it.
pub fn aggregate<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Balance {
    let (credit, debit) = transactions.into_iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(credit, debit), txn| match txn.direction {
            Direction::Credit => (credit.saturating_add(txn.amount), debit),
            Direction::Debit => (credit, debit.saturating_add(txn.amount)),
        },
    );

    Balance {
        credit,
        debit,
        balance: credit.saturating_sub(debit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentId, Timestamp};
    use std::str::FromStr;
    use time::macros::date;

    fn txn(amount: &str, direction: Direction) -> Transaction {
        Transaction {
            id: DocumentId::parse("t").unwrap(),
            ledger_id: DocumentId::parse("l").unwrap(),
            amount: Decimal::from_str(amount).unwrap(),
            direction,
            note: None,
            date: date!(2024 - 01 - 01),
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }
    }

    #[test]
    fn test_credit_minus_debit() {
        let txns = vec![txn("100", Direction::Credit), txn("40", Direction::Debit)];

        let totals = aggregate(&txns);

        assert_eq!(totals.credit, Decimal::from(100));
        assert_eq!(totals.debit, Decimal::from(40));
        assert_eq!(totals.balance, Decimal::from(60));

        let shown = totals.display();
        assert_eq!(shown.credit, "100.00");
        assert_eq!(shown.debit, "40.00");
        assert_eq!(shown.balance, "60.00");
    }

    #[test]
    fn test_empty_snapshot_is_zero() {
        let none: Vec<Transaction> = Vec::new();

        let totals = aggregate(&none);

        assert_eq!(totals, Balance::default());
        assert_eq!(totals.display().balance, "0.00");
    }

    #[test]
    fn test_sums_are_exact() {
        // 0.1 + 0.2 drifts with floats.
        let txns = vec![
            txn("0.1", Direction::Credit),
            txn("0.2", Direction::Credit),
            txn("0.3", Direction::Debit),
        ];

        let totals = aggregate(&txns);

        assert_eq!(totals.credit, Decimal::from_str("0.3").unwrap());
        assert_eq!(totals.balance, Decimal::ZERO);
    }

    #[test]
    fn test_aggregation_keeps_sub_cent_precision() {
        let txns = vec![txn("0.004", Direction::Credit), txn("0.004", Direction::Credit)];

        let totals = aggregate(&txns);

        assert_eq!(totals.credit, Decimal::from_str("0.008").unwrap());
        assert_eq!(totals.display().credit, "0.01");
    }

    #[test]
    fn test_negative_balance_display() {
        let txns = vec![txn("5", Direction::Credit), txn("12.345", Direction::Debit)];

        let shown = aggregate(&txns).display();

        assert_eq!(shown.balance, "-7.35");
        assert_eq!(
            shown.to_string(),
            "Credit: 5.00 | Debit: 12.35 | Balance: -7.35"
        );
    }

    #[test]
    fn test_huge_totals_saturate() {
        let huge = "50000000000000000000000000000";
        let txns = vec![
            txn(huge, Direction::Credit),
            txn(huge, Direction::Credit),
            txn(huge, Direction::Debit),
        ];

        let totals = aggregate(&txns);

        assert_eq!(totals.credit, Decimal::MAX);
        assert_eq!(totals.balance, Decimal::MAX - Decimal::from_str(huge).unwrap());
    }
}
