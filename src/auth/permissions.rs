//! Permission strings carried in access tokens.
//!
//! Permissions follow the `<resource>:<action>` convention. Holders of the
//! [`ADMIN_ROLE`] role pass every permission check.

/// Role that bypasses individual permission checks
pub const ADMIN_ROLE: &str = "admin";

pub mod consts {
    // Orders
    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_CANCEL: &str = "orders:cancel";

    // Catalog
    pub const PRODUCTS_MANAGE: &str = "products:manage";

    // Promotions
    pub const COUPONS_MANAGE: &str = "coupons:manage";
}

/// Every permission the API checks, used when minting operator tokens.
pub const ALL_PERMISSIONS: &[&str] = &[
    consts::ORDERS_READ,
    consts::ORDERS_CANCEL,
    consts::PRODUCTS_MANAGE,
    consts::COUPONS_MANAGE,
];

/// True when `permission` is one the API knows about.
pub fn is_known(permission: &str) -> bool {
    ALL_PERMISSIONS.contains(&permission)
}
