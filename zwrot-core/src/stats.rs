use std::collections::HashMap;

use chrono::Datelike;
use rust_decimal::Decimal;

use crate::models::{DashboardStats, DateRange, Invoice, MonthKey, MonthlyStats};

/// Computes summary statistics for an invoice collection.
///
/// Pure and total: an empty slice yields the zero-valued
/// [`DashboardStats`] (no date range, no months) rather than an error.
///
/// Amounts are summed as exact decimals. The average keeps full decimal
/// precision; rounding to cents happens when it is formatted. The monthly
/// breakdown is ordered chronologically by [`MonthKey`].
///
/// # Arguments
///
/// * `invoices` - The loaded invoices
///
/// # Returns
///
/// Returns the derived `DashboardStats`.
pub fn compute(invoices: &[Invoice]) -> DashboardStats {
    if invoices.is_empty() {
        return DashboardStats::default();
    }

    let total_amount: Decimal = invoices.iter().map(|inv| inv.kwota_faktury).sum();
    let invoice_count = invoices.len();
    let average_amount = total_amount / Decimal::from(invoice_count);

    DashboardStats {
        total_amount,
        invoice_count,
        average_amount,
        date_range: date_range(invoices),
        monthly_breakdown: monthly_breakdown(invoices),
    }
}

fn date_range(invoices: &[Invoice]) -> DateRange {
    let mut dates: Vec<String> = invoices.iter().map(Invoice::service_date_token).collect();
    dates.sort();

    match (dates.first(), dates.last()) {
        (Some(from), Some(to)) => DateRange {
            from: from.clone(),
            to: to.clone(),
        },
        _ => DateRange::default(),
    }
}

fn monthly_breakdown(invoices: &[Invoice]) -> Vec<MonthlyStats> {
    let mut months: HashMap<MonthKey, MonthlyStats> = HashMap::new();

    for invoice in invoices {
        let date = invoice.data_wykonania_uslugi;
        let key = MonthKey::new(date.year(), date.month());
        let entry = months.entry(key).or_insert_with(|| MonthlyStats {
            key,
            total: Decimal::ZERO,
            count: 0,
        });
        entry.total += invoice.kwota_faktury;
        entry.count += 1;
    }

    let mut breakdown: Vec<MonthlyStats> = months.into_values().collect();
    breakdown.sort_by_key(|entry| entry.key);
    breakdown
}
