pub mod invoice;
pub mod stats;

pub use invoice::Invoice;
pub use stats::{DashboardStats, DateRange, MonthKey, MonthlyStats};
