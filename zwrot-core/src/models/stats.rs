use std::fmt;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::format::month_label;

/// Locale-independent calendar month used as the grouping key for
/// the monthly breakdown.
///
/// Ordering is chronological (year first, then month). The human label
/// is produced by the `Display` impl and only used at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    /// Month number, 1-12
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Sortable `YYYY-MM` token.
    pub fn token(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", month_label(*self))
    }
}

/// Inclusive range of service dates, as `YYYY-MM-DD` tokens.
///
/// Both ends are empty strings when there are no invoices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

/// Sum and count of invoices serviced in one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyStats {
    pub key: MonthKey,
    pub total: Decimal,
    pub count: usize,
}

#[derive(Serialize)]
struct MonthlyStatsRepr<'a> {
    month: String,
    key: String,
    total: &'a Decimal,
    count: usize,
}

impl Serialize for MonthlyStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        MonthlyStatsRepr {
            month: self.key.to_string(),
            key: self.key.token(),
            total: &self.total,
            count: self.count,
        }
        .serialize(serializer)
    }
}

/// Summary statistics derived from the loaded invoice collection.
///
/// Always recomputed from scratch; see [`crate::stats::compute`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Sum of all invoice totals
    pub total_amount: Decimal,

    /// Number of invoices
    pub invoice_count: usize,

    /// Mean invoice total, zero for no invoices
    pub average_amount: Decimal,

    /// Earliest and latest service date
    pub date_range: DateRange,

    /// Per-month totals in chronological order
    pub monthly_breakdown: Vec<MonthlyStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_month_key_orders_chronologically() {
        let mut keys = vec![
            MonthKey::new(2024, 2),
            MonthKey::new(2023, 12),
            MonthKey::new(2024, 1),
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                MonthKey::new(2023, 12),
                MonthKey::new(2024, 1),
                MonthKey::new(2024, 2)
            ]
        );
        assert_eq!(MonthKey::new(2024, 3).token(), "2024-03");
    }

    #[test]
    fn test_monthly_stats_serializes_label_and_key() {
        let entry = MonthlyStats {
            key: MonthKey::new(2024, 1),
            total: dec!(100.50),
            count: 2,
        };

        let value = serde_json::to_value(&entry).expect("Should serialize");

        assert_eq!(value["month"], "styczeń 2024");
        assert_eq!(value["key"], "2024-01");
        assert_eq!(value["count"], 2);
        assert_eq!(value["total"], 100.5);
    }

    #[test]
    fn test_empty_stats_shape() {
        let value = serde_json::to_value(DashboardStats::default()).expect("Should serialize");

        assert_eq!(value["invoiceCount"], 0);
        assert_eq!(value["totalAmount"], 0.0);
        assert_eq!(value["dateRange"]["from"], "");
        assert_eq!(value["dateRange"]["to"], "");
        assert!(value["monthlyBreakdown"].as_array().expect("array").is_empty());
    }
}
