//! Fixed `pl-PL` presentation helpers.
//!
//! Everything user-facing is rendered in Polish; no other locale is
//! supported.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{Invoice, MonthKey};

const MONTHS: [&str; 12] = [
    "styczeń",
    "luty",
    "marzec",
    "kwiecień",
    "maj",
    "czerwiec",
    "lipiec",
    "sierpień",
    "wrzesień",
    "październik",
    "listopad",
    "grudzień",
];

/// Group separator used by `pl-PL` number formatting (no-break space).
const GROUP_SEPARATOR: char = '\u{a0}';

const TSV_HEADER: [&str; 5] = [
    "Nr faktury",
    "Data wykonania",
    "Kwota",
    "Refundacja",
    "Czy opłacone",
];

/// Long month name followed by the year, e.g. `styczeń 2024`.
pub fn month_label(key: MonthKey) -> String {
    let name = key
        .month
        .checked_sub(1)
        .and_then(|idx| MONTHS.get(idx as usize))
        .copied()
        .unwrap_or("?");
    format!("{} {}", name, key.year)
}

/// `dd.mm.yyyy`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Amount with two decimals and a comma separator, no grouping.
///
/// This is the form the insurer's portal accepts when pasted.
pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", to_cents(value)).replace('.', ",")
}

/// Amount formatted the way `pl-PL` renders currency, e.g. `12 345,60 PLN`.
///
/// Integer digits are grouped by thousands only from five digits up.
pub fn format_pln(value: Decimal) -> String {
    let rounded = format!("{:.2}", to_cents(value));
    let (sign, unsigned) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    format!("{}{},{} PLN", sign, group_thousands(int_part), frac_part)
}

/// Tab-separated claim summary, one row per invoice, ready to paste into
/// the claims spreadsheet.
pub fn summary_tsv(invoices: &[Invoice]) -> String {
    let mut lines = Vec::with_capacity(invoices.len() + 1);
    lines.push(TSV_HEADER.join("\t"));

    for invoice in invoices {
        let row = [
            format!("=\"{}\"", invoice.numer),
            format_date(invoice.data_wykonania_uslugi),
            format_amount(invoice.kwota_faktury),
            "wysłano".to_string(),
            String::new(),
        ];
        lines.push(row.join("\t"));
    }

    lines.join("\n")
}

fn to_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn group_thousands(digits: &str) -> String {
    if digits.len() < 5 {
        return digits.to_string();
    }

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(GROUP_SEPARATOR);
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn invoice(numer: &str, amount: Decimal, service_date: NaiveDate) -> Invoice {
        Invoice {
            numer: numer.to_string(),
            liczba_uslug: 1,
            data_wystawienia: service_date,
            data_wykonania_uslugi: service_date,
            miasto_wykonania: "Gdańsk".to_string(),
            cena_jednostkowa: amount,
            kwota_faktury: amount,
        }
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(MonthKey::new(2024, 1)), "styczeń 2024");
        assert_eq!(month_label(MonthKey::new(2023, 10)), "październik 2023");
        assert_eq!(month_label(MonthKey::new(2023, 13)), "? 2023");
    }

    #[test]
    fn test_format_pln_grouping() {
        assert_eq!(format_pln(dec!(0)), "0,00 PLN");
        assert_eq!(format_pln(dec!(150.5)), "150,50 PLN");
        assert_eq!(format_pln(dec!(1234.56)), "1234,56 PLN");
        assert_eq!(format_pln(dec!(12345.6)), "12\u{a0}345,60 PLN");
        assert_eq!(format_pln(dec!(1234567.891)), "1\u{a0}234\u{a0}567,89 PLN");
        assert_eq!(format_pln(dec!(-20000)), "-20\u{a0}000,00 PLN");
    }

    #[test]
    fn test_format_pln_rounds_half_away_from_zero() {
        assert_eq!(format_pln(dec!(75.255)), "75,26 PLN");
        assert_eq!(format_pln(dec!(75.245)), "75,25 PLN");
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 5).expect("valid date");
        assert_eq!(format_date(date), "05.02.2024");
    }

    #[test]
    fn test_summary_tsv() {
        let invoices = vec![
            invoice(
                "FV/1/2024",
                dec!(100),
                NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date"),
            ),
            invoice(
                "FV/2/2024",
                dec!(50.5),
                NaiveDate::from_ymd_opt(2024, 2, 5).expect("valid date"),
            ),
        ];

        let tsv = summary_tsv(&invoices);
        let lines: Vec<&str> = tsv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Nr faktury\tData wykonania\tKwota\tRefundacja\tCzy opłacone");
        assert_eq!(lines[1], "=\"FV/1/2024\"\t10.01.2024\t100,00\twysłano\t");
        assert_eq!(lines[2], "=\"FV/2/2024\"\t05.02.2024\t50,50\twysłano\t");
        assert!(!tsv.ends_with('\n'));
    }

    #[test]
    fn test_summary_tsv_empty() {
        assert_eq!(
            summary_tsv(&[]),
            "Nr faktury\tData wykonania\tKwota\tRefundacja\tCzy opłacone"
        );
    }
}
