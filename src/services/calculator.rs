//! Checkout arithmetic: vendor grouping, shipping, tax and totals.
//!
//! Everything here is pure and works on `Decimal`; the order service feeds it
//! re-priced lines and persists what comes back. Multiplications are checked,
//! an overflow surfaces as a 400 rather than a panic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::entities::{OrderType, TaxMode};
use crate::errors::ServiceError;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Upper bound for any amount a client or operator may submit
pub const MAX_MONEY: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Money fields: non-negative and at most `MAX_MONEY`
pub fn validate_money(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("must_not_be_negative"));
    }
    if *value > MAX_MONEY {
        return Err(ValidationError::new("amount_too_large"));
    }
    Ok(())
}

fn out_of_range() -> ServiceError {
    ServiceError::InvalidInput("Amount is out of range".to_string())
}

fn checked_percent(amount: Decimal, rate: Decimal) -> Result<Decimal, ServiceError> {
    amount
        .checked_mul(rate)
        .and_then(|scaled| scaled.checked_div(HUNDRED))
        .ok_or_else(out_of_range)
}

/// Rounds half away from zero to cents
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `base + base × rate / 100`
pub fn shipping_with_tax(base: Decimal, rate: Decimal) -> Result<Decimal, ServiceError> {
    let tax = checked_percent(base, rate)?;
    base.checked_add(tax).map(round2).ok_or_else(out_of_range)
}

pub fn line_tax(
    unit_price: Decimal,
    quantity: i32,
    rate: Decimal,
) -> Result<Decimal, ServiceError> {
    let gross = unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(out_of_range)?;
    checked_percent(gross, rate).map(round2)
}

pub fn percentage_of(amount: Decimal, rate: Decimal) -> Result<Decimal, ServiceError> {
    checked_percent(amount, rate).map(round2)
}

impl TaxMode {
    pub fn for_order_type(order_type: OrderType) -> Self {
        match order_type {
            OrderType::Pos => TaxMode::ZoneWiseTax,
            OrderType::Storefront => TaxMode::BillingAddress,
        }
    }
}

/// A cart line after server-side re-pricing
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub diamond_id: Option<String>,
    pub vendor_id: Option<Uuid>,
    pub quantity: i32,
    /// Catalog unit price charged for the line
    pub unit_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub tax_rate: Decimal,
    pub options: serde_json::Value,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    pub fn tax(&self) -> Result<Decimal, ServiceError> {
        line_tax(self.unit_price, self.quantity, self.tax_rate)
    }
}

/// Lines owned by one vendor. `vendor_id = None` is the platform itself.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorGroup {
    pub vendor_id: Option<Uuid>,
    pub lines: Vec<PricedLine>,
}

impl VendorGroup {
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(PricedLine::line_total).sum()
    }

    pub fn line_tax_total(&self) -> Result<Decimal, ServiceError> {
        self.lines.iter().map(PricedLine::tax).sum()
    }

    /// Group tax under the given mode
    pub fn tax(&self, mode: TaxMode, zone_rate: Decimal) -> Result<Decimal, ServiceError> {
        match mode {
            TaxMode::BillingAddress => self.line_tax_total(),
            TaxMode::ZoneWiseTax => percentage_of(self.subtotal(), zone_rate),
        }
    }
}

/// Splits lines into vendor groups. The platform group leads, vendors follow
/// in the order they first appear in the cart.
pub fn group_by_vendor(lines: Vec<PricedLine>) -> Vec<VendorGroup> {
    let mut platform: Vec<PricedLine> = Vec::new();
    let mut vendors: Vec<VendorGroup> = Vec::new();

    for line in lines {
        match line.vendor_id {
            None => platform.push(line),
            Some(vendor_id) => match vendors
                .iter_mut()
                .find(|g| g.vendor_id == Some(vendor_id))
            {
                Some(group) => group.lines.push(line),
                None => vendors.push(VendorGroup {
                    vendor_id: Some(vendor_id),
                    lines: vec![line],
                }),
            },
        }
    }

    let mut groups = Vec::with_capacity(vendors.len() + 1);
    if !platform.is_empty() {
        groups.push(VendorGroup {
            vendor_id: None,
            lines: platform,
        });
    }
    groups.extend(vendors);
    groups
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingQuote {
    #[validate(custom = "validate_money")]
    #[schema(value_type = String, example = "10.00")]
    pub cost: Decimal,
}

/// Base shipping costs quoted to the buyer, before shipping tax
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShippingBreakdown {
    #[serde(default)]
    pub admin: Option<ShippingQuote>,
    #[serde(default)]
    pub vendors: HashMap<Uuid, ShippingQuote>,
}

/// Shipping after tax, per group and in total
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShippingCharges {
    pub platform: Decimal,
    pub vendors: HashMap<Uuid, Decimal>,
    pub total: Decimal,
}

impl ShippingCharges {
    pub fn for_group(&self, vendor_id: Option<Uuid>) -> Decimal {
        match vendor_id {
            None => self.platform,
            Some(id) => self.vendors.get(&id).copied().unwrap_or(Decimal::ZERO),
        }
    }
}

impl ShippingBreakdown {
    /// Field messages for every quote that fails `validate_money`
    pub fn validation_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        let quotes = self
            .admin
            .iter()
            .map(|quote| ("shipping.admin".to_string(), quote))
            .chain(
                self.vendors
                    .iter()
                    .map(|(id, quote)| (format!("shipping.vendors[{}]", id), quote)),
            );
        for (path, quote) in quotes {
            if let Err(errors) = quote.validate() {
                if let ServiceError::InvalidFields(found) = ServiceError::from(errors) {
                    messages.extend(found.into_iter().map(|m| format!("{}.{}", path, m)));
                }
            }
        }
        messages
    }
}

/// Applies shipping tax to the platform quote and to the quote of every
/// vendor present in `groups`. Quotes for vendors without lines are ignored.
/// Point-of-sale orders ship nothing.
pub fn shipping_charges(
    breakdown: &ShippingBreakdown,
    groups: &[VendorGroup],
    rate: Decimal,
    order_type: OrderType,
) -> Result<ShippingCharges, ServiceError> {
    if order_type == OrderType::Pos {
        return Ok(ShippingCharges::default());
    }

    let platform = match &breakdown.admin {
        Some(quote) => shipping_with_tax(quote.cost, rate)?,
        None => Decimal::ZERO,
    };
    let mut vendors = HashMap::new();
    for group in groups {
        let Some(vendor_id) = group.vendor_id else {
            continue;
        };
        if let Some(quote) = breakdown.vendors.get(&vendor_id) {
            vendors.insert(vendor_id, shipping_with_tax(quote.cost, rate)?);
        }
    }
    let total = vendors
        .values()
        .try_fold(platform, |acc, cost| acc.checked_add(*cost))
        .ok_or_else(out_of_range)?;

    Ok(ShippingCharges {
        platform,
        vendors,
        total,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Grand total rounded to cents, never below zero
pub fn order_totals(
    subtotal: Decimal,
    discount: Decimal,
    tax: Decimal,
    shipping: Decimal,
) -> OrderTotals {
    OrderTotals {
        subtotal,
        discount,
        tax,
        shipping,
        total: round2(subtotal - discount + tax + shipping).max(Decimal::ZERO),
    }
}
