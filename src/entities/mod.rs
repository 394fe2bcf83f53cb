//! sea-orm table definitions and their conversions to the domain documents.

pub mod coupon;
pub mod food;
pub mod order;
pub mod payment;
pub mod review;
pub mod sequence_counter;
