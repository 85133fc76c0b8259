//! Invoice numbering and rendering. Rendering sits behind a trait so a PDF
//! or third-party renderer can replace the built-in JSON document.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::entities::{invoice, user};
use crate::errors::ServiceError;
use crate::services::calculator::{OrderTotals, VendorGroup};

/// `<prefix>-<YYYYMMDD>-<first hex_len hex digits of id, upper-case>`
pub fn document_number(prefix: &str, at: DateTime<Utc>, id: Uuid, hex_len: usize) -> String {
    let hex = id.simple().to_string().to_uppercase();
    format!(
        "{}-{}-{}",
        prefix,
        at.format("%Y%m%d"),
        &hex[..hex_len.min(hex.len())]
    )
}

/// Hex lengths tried in turn when a number is already taken
pub const NUMBER_LENGTHS: [usize; 4] = [8, 12, 16, 32];

/// What the invoice is rendered from
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum InvoiceSource {
    /// The checkout snapshot the buyer confirmed
    Session { snapshot: Value },
    /// The server-priced cart, when no session was referenced
    Cart { groups: Vec<Value> },
}

impl InvoiceSource {
    pub fn from_groups(groups: &[VendorGroup]) -> Result<Self, ServiceError> {
        let mut rendered = Vec::with_capacity(groups.len());
        for group in groups {
            let mut lines = Vec::with_capacity(group.lines.len());
            for line in &group.lines {
                lines.push(json!({
                    "product_id": line.product_id,
                    "variant_id": line.variant_id,
                    "quantity": line.quantity,
                    "unit_price": line.unit_price,
                    "tax": line.tax()?,
                }));
            }
            rendered.push(json!({
                "vendor_id": group.vendor_id,
                "subtotal": group.subtotal(),
                "lines": lines,
            }));
        }
        Ok(InvoiceSource::Cart { groups: rendered })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceContext {
    pub invoice_number: String,
    pub order_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub buyer_name: String,
    pub buyer_email: String,
    pub shipping: Decimal,
    pub source: InvoiceSource,
}

pub trait InvoiceRenderer: Send + Sync {
    fn render(&self, context: &InvoiceContext) -> Result<Value, ServiceError>;
}

/// Stores the invoice as a structured JSON document
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonInvoiceRenderer;

impl InvoiceRenderer for JsonInvoiceRenderer {
    fn render(&self, context: &InvoiceContext) -> Result<Value, ServiceError> {
        Ok(serde_json::to_value(context)?)
    }
}

/// Totals are only known after the discount step, so they are patched into
/// the stored document once computed.
pub fn with_totals(mut document: Value, totals: &OrderTotals) -> Value {
    if let Value::Object(map) = &mut document {
        map.insert("totals".to_string(), json!(totals));
    }
    document
}

async fn free_number<C: ConnectionTrait>(
    conn: &C,
    prefix: &str,
    at: DateTime<Utc>,
    seed: Uuid,
) -> Result<String, ServiceError> {
    for len in NUMBER_LENGTHS {
        let candidate = document_number(prefix, at, seed, len);
        let taken = invoice::Entity::find()
            .filter(invoice::Column::InvoiceNumber.eq(candidate.as_str()))
            .count(conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
    Err(ServiceError::InternalError(
        "Could not allocate an invoice number".to_string(),
    ))
}

/// Renders and stores the invoice for a freshly inserted order.
pub async fn generate<C: ConnectionTrait>(
    conn: &C,
    renderer: &dyn InvoiceRenderer,
    prefix: &str,
    order_id: Uuid,
    buyer: &user::Model,
    shipping: Decimal,
    source: InvoiceSource,
) -> Result<invoice::Model, ServiceError> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let invoice_number = free_number(conn, prefix, now, id).await?;

    let context = InvoiceContext {
        invoice_number: invoice_number.clone(),
        order_id,
        issued_at: now,
        buyer_name: buyer.name.clone(),
        buyer_email: buyer.email.clone(),
        shipping,
        source,
    };
    let document = renderer.render(&context)?;

    Ok(invoice::ActiveModel {
        id: Set(id),
        invoice_number: Set(invoice_number),
        order_id: Set(order_id),
        document: Set(document),
        created_at: Set(now),
    }
    .insert(conn)
    .await?)
}

/// Rewrites the stored document with the final totals.
pub async fn attach_totals<C: ConnectionTrait>(
    conn: &C,
    invoice: invoice::Model,
    totals: &OrderTotals,
) -> Result<invoice::Model, ServiceError> {
    let document = with_totals(invoice.document.clone(), totals);
    let mut model: invoice::ActiveModel = invoice.into();
    model.document = Set(document);
    Ok(model.update(conn).await?)
}
