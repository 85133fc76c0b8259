//! Business services. Helpers that take a generic `ConnectionTrait` run on
//! whatever connection or transaction the caller hands them.

pub mod calculator;
pub mod coupons;
pub mod inventory;
pub mod invoices;
pub mod order_sessions;
pub mod orders;
pub mod products;
pub mod users;
