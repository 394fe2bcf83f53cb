pub mod analytics;
pub mod checkout;
pub mod common;
pub mod coupons;
pub mod delivery;
pub mod health;
pub mod invoices;
pub mod orders;
pub mod payments;
pub mod reviews;

// Re-export AppState from the crate root for handlers
pub use crate::AppState;
