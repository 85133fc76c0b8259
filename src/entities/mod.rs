//! sea-orm entities. Every table keys on a v4 UUID.

pub mod coupon;
pub mod inventory;
pub mod inventory_detail;
pub mod inventory_detail_attribute;
pub mod invoice;
pub mod order;
pub mod order_address;
pub mod order_item;
pub mod order_payment;
pub mod order_session;
pub mod order_track;
pub mod product;
pub mod sub_order;
pub mod user;
pub mod user_coupon;

pub use order::{OrderStatus, OrderType, PaymentGateway, PaymentStatus, TaxMode};
pub use coupon::DiscountType;
