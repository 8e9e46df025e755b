//! Core library of the Zwrot claim assistant.
//!
//! Loads the invoice data set, computes the dashboard statistics and
//! drives the step-by-step refund claim wizard together with the local
//! helper process.

pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod helper;
pub mod loader;
pub mod models;
pub mod stats;
pub mod wizard;
