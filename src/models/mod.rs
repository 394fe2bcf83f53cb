//! Domain documents shared by services, repositories and handlers.

pub mod coupon;
pub mod order;
pub mod payment;
pub mod review;

pub use coupon::{Coupon, CouponDraft, DiscountType};
pub use order::{
    DeliveryAddress, Order, OrderFilter, OrderItem, OrderStatus, PaymentFilter, StatusEntry,
};
pub use payment::{
    Payment, PaymentMethod, PaymentMethodDetails, PaymentStatus, RefundRecord,
};
pub use review::{
    Food, FoodRating, RatingSnapshot, Review, ReviewFilter, ReviewInput, ReviewSort, SortDirection,
};

#[cfg(test)]
pub(crate) mod fixtures;
