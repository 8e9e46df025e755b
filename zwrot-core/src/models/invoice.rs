use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice model representing one reimbursable service record.
///
/// Field names follow the data file produced by the invoice downloader,
/// so the struct maps 1:1 onto the JSON records in `faktury_dane.json`.
/// Records are never mutated after loading; a refresh replaces the whole
/// collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice number (unique within a batch, not validated)
    pub numer: String,

    /// Number of services billed on the invoice
    pub liczba_uslug: u32,

    /// Date the invoice was issued
    pub data_wystawienia: NaiveDate,

    /// Date the service was performed
    pub data_wykonania_uslugi: NaiveDate,

    /// City where the service was performed
    pub miasto_wykonania: String,

    /// Price of a single service
    pub cena_jednostkowa: Decimal,

    /// Invoice total
    pub kwota_faktury: Decimal,
}

impl Invoice {
    /// Service date as the zero-padded `YYYY-MM-DD` token used for date ranges.
    pub fn service_date_token(&self) -> String {
        self.data_wykonania_uslugi.format("%Y-%m-%d").to_string()
    }
}
