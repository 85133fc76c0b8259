use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::cache::{self, keys, CacheBackend};
use crate::config::CheckoutConfig;
use crate::db::{DbPool, SoftDelete};
use crate::entities::{
    inventory_detail, order, order_address, order_item, order_payment, order_track, product,
    sub_order, user, OrderStatus, OrderType, PaymentGateway, PaymentStatus, TaxMode,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::calculator::{
    group_by_vendor, order_totals, percentage_of, shipping_charges, validate_money, OrderTotals,
    PricedLine, ShippingBreakdown,
};
use crate::services::coupons::{AppliedCoupon, CouponService};
use crate::services::inventory::{self, StockLine};
use crate::services::invoices::{self, InvoiceRenderer, InvoiceSource, NUMBER_LENGTHS};
use crate::services::order_sessions;
use crate::services::users::{self, CustomerDetails};

/// Per-line options. The `kind` tag decides which fields apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineOptions {
    Simple {
        #[serde(default)]
        vendor_id: Option<Uuid>,
        #[serde(default)]
        #[schema(value_type = Option<String>)]
        tax_rate: Option<Decimal>,
        #[serde(default)]
        selections: BTreeMap<String, String>,
    },
    /// A variant-tracked piece, optionally set with a specific stone
    Gemstone {
        #[serde(default)]
        vendor_id: Option<Uuid>,
        #[serde(default)]
        #[schema(value_type = Option<String>)]
        tax_rate: Option<Decimal>,
        #[serde(default)]
        selections: BTreeMap<String, String>,
        variant_id: Uuid,
        #[serde(default)]
        diamond_id: Option<String>,
    },
}

impl Default for LineOptions {
    fn default() -> Self {
        LineOptions::Simple {
            vendor_id: None,
            tax_rate: None,
            selections: BTreeMap::new(),
        }
    }
}

impl LineOptions {
    pub fn vendor_id(&self) -> Option<Uuid> {
        match self {
            LineOptions::Simple { vendor_id, .. } | LineOptions::Gemstone { vendor_id, .. } => {
                *vendor_id
            }
        }
    }

    pub fn tax_rate(&self) -> Option<Decimal> {
        match self {
            LineOptions::Simple { tax_rate, .. } | LineOptions::Gemstone { tax_rate, .. } => {
                *tax_rate
            }
        }
    }

    pub fn variant_id(&self) -> Option<Uuid> {
        match self {
            LineOptions::Simple { .. } => None,
            LineOptions::Gemstone { variant_id, .. } => Some(*variant_id),
        }
    }

    pub fn diamond_id(&self) -> Option<&str> {
        match self {
            LineOptions::Simple { .. } => None,
            LineOptions::Gemstone { diamond_id, .. } => diamond_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000"))]
    pub quantity: i32,
    /// Unit price the buyer saw
    #[validate(custom = "validate_money")]
    #[schema(value_type = String, example = "100.00")]
    pub price: Decimal,
    #[serde(default)]
    pub options: LineOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Address line 1 is required"))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    #[validate(length(min = 2, max = 64, message = "Country is required"))]
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate]
    pub customer: CustomerDetails,
    #[validate]
    pub shipping_address: AddressInput,
    #[validate]
    #[serde(default)]
    pub billing_address: Option<AddressInput>,
    #[validate(length(min = 1, message = "Cart must contain at least one item"))]
    pub cart: Vec<CartLine>,
    #[serde(default)]
    pub shipping: ShippingBreakdown,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub order_session_id: Option<Uuid>,
    #[serde(default)]
    pub payment_gateway: PaymentGateway,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default, rename = "type")]
    pub order_type: OrderType,
    #[validate(length(max = 2000, message = "Note is too long"))]
    #[serde(default)]
    pub note: Option<String>,
}

impl CreateOrderRequest {
    fn validate_all(&self) -> Result<(), ServiceError> {
        let mut messages = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => match ServiceError::from(errors) {
                ServiceError::InvalidFields(messages) => messages,
                other => return Err(other),
            },
        };
        for (index, line) in self.cart.iter().enumerate() {
            if let Err(errors) = line.validate() {
                if let ServiceError::InvalidFields(line_messages) = ServiceError::from(errors) {
                    messages.extend(
                        line_messages
                            .into_iter()
                            .map(|m| format!("cart[{}].{}", index, m)),
                    );
                }
            }
        }
        messages.extend(self.shipping.validation_messages());
        if messages.is_empty() {
            Ok(())
        } else {
            messages.sort();
            Err(ServiceError::InvalidFields(messages))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub order_number: String,
    #[schema(value_type = String, example = "231.00")]
    pub total_amount: Decimal,
    pub invoice_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: Option<String>,
    pub user_id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_gateway: PaymentGateway,
    pub order_type: OrderType,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubOrderDetail {
    #[schema(value_type = Object)]
    pub sub_order: sub_order::Model,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetail {
    #[schema(value_type = Object)]
    pub order: order::Model,
    #[schema(value_type = Option<Object>)]
    pub address: Option<order_address::Model>,
    pub sub_orders: Vec<SubOrderDetail>,
    #[schema(value_type = Vec<Object>)]
    pub tracks: Vec<order_track::Model>,
    #[schema(value_type = Option<Object>)]
    pub payment: Option<order_payment::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelResult {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

/// Admin listing filters, decoded from the `filters` query parameter
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OrderFilters {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub order_number: Option<String>,
    pub user_id: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    OrderNumber,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for OrderSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl OrderSort {
    /// Parses `{"<field>": "asc"|"desc"}`.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let map: HashMap<String, String> = serde_json::from_str(raw)
            .map_err(|_| ServiceError::BadRequest("Invalid sort parameter".to_string()))?;
        let mut entries = map.into_iter();
        let (Some((field, direction)), None) = (entries.next(), entries.next()) else {
            return Err(ServiceError::BadRequest(
                "Sort must name exactly one field".to_string(),
            ));
        };
        let field = match field.as_str() {
            "created_at" => SortField::CreatedAt,
            "order_number" => SortField::OrderNumber,
            "status" => SortField::Status,
            other => {
                return Err(ServiceError::BadRequest(format!(
                    "Cannot sort by {}",
                    other
                )))
            }
        };
        let descending = match direction.to_ascii_lowercase().as_str() {
            "asc" => false,
            "desc" => true,
            _ => {
                return Err(ServiceError::BadRequest(
                    "Sort direction must be asc or desc".to_string(),
                ))
            }
        };
        Ok(Self { field, descending })
    }

    fn column(&self) -> order::Column {
        match self.field {
            SortField::CreatedAt => order::Column::CreatedAt,
            SortField::OrderNumber => order::Column::OrderNumber,
            SortField::Status => order::Column::Status,
        }
    }
}

/// What the transactional part of checkout hands back for post-commit work
struct Placed {
    order: order::Model,
    totals: OrderTotals,
    invoice_number: String,
    coupon: Option<AppliedCoupon>,
    buyer: user::Model,
    stock: Vec<StockLine>,
}

/// Order pipeline: checkout, reads and cancellation
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    cache: Arc<dyn CacheBackend>,
    event_sender: Arc<EventSender>,
    checkout: CheckoutConfig,
    invoice_renderer: Arc<dyn InvoiceRenderer>,
    cache_ttl: Duration,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        cache: Arc<dyn CacheBackend>,
        event_sender: Arc<EventSender>,
        checkout: CheckoutConfig,
        invoice_renderer: Arc<dyn InvoiceRenderer>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            db_pool,
            cache,
            event_sender,
            checkout,
            invoice_renderer,
            cache_ttl,
        }
    }

    /// Places an order. All writes share one transaction; any failure leaves
    /// no trace in the database.
    #[instrument(skip(self, request), fields(customer = %request.customer.email, lines = request.cart.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderCreated, ServiceError> {
        request.validate_all()?;
        let started = Instant::now();

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            Self::surface(e.into())
        })?;

        let placed = match self.place(&txn, &request).await {
            Ok(placed) => placed,
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed checkout also failed");
                }
                counter!("gemstore_orders_failed_total", 1);
                return Err(Self::surface(err));
            }
        };

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit order creation transaction");
            Self::surface(e.into())
        })?;

        self.after_commit(&placed).await;
        histogram!(
            "gemstore_order_create_duration_seconds",
            started.elapsed().as_secs_f64()
        );

        let order_number = placed.order.order_number.clone().unwrap_or_default();
        info!(
            order_id = %placed.order.id,
            order_number = %order_number,
            total = %placed.totals.total,
            "order created"
        );

        Ok(OrderCreated {
            order_id: placed.order.id,
            order_number,
            total_amount: placed.totals.total,
            invoice_number: placed.invoice_number,
            created_at: placed.order.created_at,
        })
    }

    /// Business errors pass through; anything else becomes a generic 500.
    fn surface(err: ServiceError) -> ServiceError {
        if err.is_internal() {
            error!(error = %err, "order creation failed");
            ServiceError::InternalError("Failed to create order".to_string())
        } else {
            err
        }
    }

    async fn place(
        &self,
        txn: &DatabaseTransaction,
        request: &CreateOrderRequest,
    ) -> Result<Placed, ServiceError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        // buyer
        let buyer = users::resolve_buyer(txn, &request.customer).await?;

        // re-price and group
        let priced = self.price_cart(txn, &request.cart).await?;
        let stock: Vec<StockLine> = priced
            .iter()
            .map(|line| StockLine {
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
            })
            .collect();
        let groups = group_by_vendor(priced);

        let order_type = request.order_type;
        let shipping = shipping_charges(
            &request.shipping,
            &groups,
            self.checkout.shipping_tax_rate,
            order_type,
        )?;
        let tax_mode = TaxMode::for_order_type(order_type);
        let single_vendor = match groups.as_slice() {
            [only] => only.vendor_id,
            _ => None,
        };

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(None),
            user_id: Set(buyer.id),
            vendor_id: Set(single_vendor),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Unpaid),
            payment_gateway: Set(request.payment_gateway),
            payment_reference: Set(request.payment_reference.clone()),
            coupon_code: Set(None),
            coupon_amount: Set(Decimal::ZERO),
            order_type: Set(order_type),
            tax_type: Set(tax_mode),
            invoice_number: Set(None),
            order_session_id: Set(request.order_session_id),
            note: Set(request.note.clone()),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(txn)
        .await?;

        // invoice, from the confirmed session when there is one
        let source = match request.order_session_id {
            Some(session_id) => InvoiceSource::Session {
                snapshot: order_sessions::consume(txn, session_id).await?.snapshot,
            },
            None => InvoiceSource::from_groups(&groups)?,
        };
        let invoice = invoices::generate(
            txn,
            self.invoice_renderer.as_ref(),
            &self.checkout.invoice_prefix,
            order_id,
            &buyer,
            shipping.total,
            source,
        )
        .await?;

        let order_number =
            Self::free_order_number(txn, &self.checkout.order_number_prefix, now, order_id)
                .await?;
        let mut numbered: order::ActiveModel = order.into();
        numbered.order_number = Set(Some(order_number));
        numbered.invoice_number = Set(Some(invoice.invoice_number.clone()));
        let order = numbered.update(txn).await?;

        let address = Self::insert_address(txn, order_id, request, now).await?;

        order_track::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            name: Set(order_track::ORDERED.to_string()),
            actor: Set(buyer.email.clone()),
            note: Set(None),
            created_at: Set(now),
        }
        .insert(txn)
        .await?;

        // sub-orders and line items
        let zone_rate = self.checkout.zone_tax_rate;
        let mut subtotal = Decimal::ZERO;
        let mut tax = Decimal::ZERO;
        for group in &groups {
            let group_subtotal = group.subtotal();
            let group_tax = group.tax(tax_mode, zone_rate)?;
            subtotal += group_subtotal;
            tax += group_tax;

            let sub = sub_order::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                vendor_id: Set(group.vendor_id),
                total_amount: Set(group_subtotal),
                shipping_cost: Set(shipping.for_group(group.vendor_id)),
                tax_amount: Set(group_tax),
                tax_type: Set(tax_mode),
                address_id: Set(Some(address.id)),
                status: Set(OrderStatus::Pending),
                created_at: Set(now),
                updated_at: Set(None),
            }
            .insert(txn)
            .await?;

            let items = group
                .lines
                .iter()
                .map(|line| -> Result<order_item::ActiveModel, ServiceError> {
                    let line_tax = match tax_mode {
                        TaxMode::BillingAddress => line.tax()?,
                        TaxMode::ZoneWiseTax => percentage_of(line.line_total(), zone_rate)?,
                    };
                    Ok(order_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        order_id: Set(order_id),
                        sub_order_id: Set(sub.id),
                        product_id: Set(line.product_id),
                        variant_id: Set(line.variant_id),
                        diamond_id: Set(line.diamond_id.clone()),
                        quantity: Set(line.quantity),
                        price: Set(line.unit_price),
                        sale_price: Set(line.sale_price),
                        tax_amount: Set(line_tax),
                        options: Set(line.options.clone()),
                        created_at: Set(now),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            order_item::Entity::insert_many(items)
                .exec_without_returning(txn)
                .await?;
        }

        // coupon
        let coupon = match request
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
        {
            Some(code) => Some(
                CouponService::apply_to_order(txn, code, &groups, subtotal, buyer.id, order_id)
                    .await?,
            ),
            None => None,
        };
        let discount = coupon
            .as_ref()
            .map(|applied| applied.discount)
            .unwrap_or(Decimal::ZERO);

        if tax_mode == TaxMode::ZoneWiseTax {
            tax = percentage_of(subtotal - discount, zone_rate)?;
        }

        let totals = order_totals(subtotal, discount, tax, shipping.total);
        order_payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            subtotal: Set(totals.subtotal),
            coupon_amount: Set(totals.discount),
            shipping_cost: Set(totals.shipping),
            tax_amount: Set(totals.tax),
            total: Set(totals.total),
            created_at: Set(now),
        }
        .insert(txn)
        .await?;
        let invoice = invoices::attach_totals(txn, invoice, &totals).await?;

        // payment
        let payment_status = if request.payment_gateway == PaymentGateway::Wallet {
            users::debit_wallet(txn, buyer.id, totals.total).await?;
            PaymentStatus::Paid
        } else {
            PaymentStatus::Unpaid
        };

        let mut finished: order::ActiveModel = order.into();
        finished.coupon_code = Set(coupon.as_ref().map(|applied| applied.coupon.code.clone()));
        finished.coupon_amount = Set(totals.discount);
        finished.payment_status = Set(payment_status);
        finished.updated_at = Set(Some(Utc::now()));
        let order = finished.update(txn).await?;

        // stock last, so a shortage rolls back everything above
        for line in &stock {
            inventory::reserve(txn, *line).await?;
        }

        Ok(Placed {
            order,
            totals,
            invoice_number: invoice.invoice_number,
            coupon,
            buyer,
            stock,
        })
    }

    async fn after_commit(&self, placed: &Placed) {
        counter!("gemstore_orders_created_total", 1);
        if let Some(applied) = &placed.coupon {
            counter!("gemstore_coupons_redeemed_total", 1);
            cache::invalidate(self.cache.as_ref(), &keys::coupon(&applied.coupon.code)).await;
            self.event_sender
                .send_or_log(Event::CouponRedeemed {
                    coupon_id: applied.coupon.id,
                    user_id: placed.buyer.id,
                    order_id: placed.order.id,
                })
                .await;
        }
        for line in &placed.stock {
            cache::invalidate(self.cache.as_ref(), &keys::product(line.product_id)).await;
            self.event_sender
                .send_or_log(Event::InventoryReserved {
                    product_id: line.product_id,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: placed.order.id,
                order_number: placed.order.order_number.clone().unwrap_or_default(),
                total: placed.totals.total,
            })
            .await;
    }

    /// Server-side pricing of every cart line
    async fn price_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart: &[CartLine],
    ) -> Result<Vec<PricedLine>, ServiceError> {
        let tolerance = self.checkout.price_tolerance;
        let mut priced = Vec::with_capacity(cart.len());

        for line in cart {
            let product = product::Entity::find_live_by_id(line.product_id)
                .one(conn)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    ServiceError::BadRequest(format!(
                        "Product {} is not available",
                        line.product_id
                    ))
                })?;

            let server_price = match &line.options {
                LineOptions::Simple { .. } => product.effective_price(),
                LineOptions::Gemstone { variant_id, .. } => {
                    let variant = inventory_detail::Entity::find_live_by_id(*variant_id)
                        .filter(inventory_detail::Column::ProductId.eq(product.id))
                        .one(conn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::BadRequest(format!(
                                "Variant {} not found for product {}",
                                variant_id, product.id
                            ))
                        })?;
                    variant.price.unwrap_or_else(|| product.effective_price())
                }
            };

            if (line.price - server_price).abs() > tolerance {
                return Err(ServiceError::BadRequest(format!(
                    "Price mismatch for product {}",
                    product.id
                )));
            }
            if let Some(hint) = line.options.tax_rate() {
                if (hint - product.tax_rate).abs() > tolerance {
                    return Err(ServiceError::BadRequest(format!(
                        "Tax rate mismatch for product {}",
                        product.id
                    )));
                }
            }
            if let Some(claimed) = line.options.vendor_id() {
                if Some(claimed) != product.vendor_id {
                    return Err(ServiceError::BadRequest(format!(
                        "Vendor mismatch for product {}",
                        product.id
                    )));
                }
            }

            priced.push(PricedLine {
                product_id: product.id,
                variant_id: line.options.variant_id(),
                diamond_id: line.options.diamond_id().map(str::to_string),
                vendor_id: product.vendor_id,
                quantity: line.quantity,
                unit_price: server_price,
                sale_price: product.sale_price,
                tax_rate: product.tax_rate,
                options: serde_json::to_value(&line.options)?,
            });
        }
        Ok(priced)
    }

    async fn free_order_number<C: ConnectionTrait>(
        conn: &C,
        prefix: &str,
        at: DateTime<Utc>,
        order_id: Uuid,
    ) -> Result<String, ServiceError> {
        for len in NUMBER_LENGTHS {
            let candidate = invoices::document_number(prefix, at, order_id, len);
            let taken = order::Entity::find()
                .filter(order::Column::OrderNumber.eq(candidate.as_str()))
                .count(conn)
                .await?;
            if taken == 0 {
                return Ok(candidate);
            }
        }
        Err(ServiceError::InternalError(
            "Could not allocate an order number".to_string(),
        ))
    }

    async fn insert_address<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
        request: &CreateOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<order_address::Model, ServiceError> {
        let shipping = &request.shipping_address;
        let billing = match &request.billing_address {
            Some(billing) => Some(serde_json::to_value(billing)?),
            None => None,
        };
        Ok(order_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            name: Set(shipping.name.clone()),
            email: Set(shipping
                .email
                .clone()
                .or_else(|| Some(request.customer.email.clone()))),
            phone: Set(shipping.phone.clone().or_else(|| request.customer.phone.clone())),
            address_line1: Set(shipping.address_line1.clone()),
            address_line2: Set(shipping.address_line2.clone()),
            city: Set(shipping.city.clone()),
            state: Set(shipping.state.clone()),
            postal_code: Set(shipping.postal_code.clone()),
            country: Set(shipping.country.clone()),
            billing_address: Set(billing),
            created_at: Set(now),
        }
        .insert(conn)
        .await?)
    }

    /// Loads the full order aggregate, reading through the cache.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let key = keys::order(order_id);
        if let Some(hit) = cache::get_json::<OrderDetail>(self.cache.as_ref(), &key).await {
            return Ok(hit);
        }

        let db = &*self.db_pool;
        let order = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let address = order_address::Entity::find()
            .filter(order_address::Column::OrderId.eq(order_id))
            .one(db)
            .await?;
        let subs = sub_order::Entity::find()
            .filter(sub_order::Column::OrderId.eq(order_id))
            .order_by_asc(sub_order::Column::CreatedAt)
            .all(db)
            .await?;
        let mut items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(db)
            .await?;
        let tracks = order_track::Entity::find()
            .filter(order_track::Column::OrderId.eq(order_id))
            .order_by_asc(order_track::Column::CreatedAt)
            .all(db)
            .await?;
        let payment = order_payment::Entity::find()
            .filter(order_payment::Column::OrderId.eq(order_id))
            .one(db)
            .await?;

        let sub_orders = subs
            .into_iter()
            .map(|sub| {
                let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut items)
                    .into_iter()
                    .partition(|item| item.sub_order_id == sub.id);
                items = rest;
                SubOrderDetail {
                    sub_order: sub,
                    items: mine,
                }
            })
            .collect();

        let detail = OrderDetail {
            order,
            address,
            sub_orders,
            tracks,
            payment,
        };
        cache::put_json(self.cache.as_ref(), &key, &detail, self.cache_ttl).await;
        Ok(detail)
    }

    /// Paginated listing. Buyer history passes only `user_id` in `filters`.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filters: &OrderFilters,
        sort: OrderSort,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderSummary>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut condition = Condition::all();
        if let Some(status) = filters.status {
            condition = condition.add(order::Column::Status.eq(status));
        }
        if let Some(payment_status) = filters.payment_status {
            condition = condition.add(order::Column::PaymentStatus.eq(payment_status));
        }
        if let Some(number) = filters.order_number.as_deref().filter(|n| !n.is_empty()) {
            condition = condition.add(order::Column::OrderNumber.contains(number));
        }
        if let Some(user_id) = filters.user_id {
            condition = condition.add(order::Column::UserId.eq(user_id));
        }
        if let Some(vendor_id) = filters.vendor_id {
            condition = condition.add(
                order::Column::Id.in_subquery(
                    Query::select()
                        .column(sub_order::Column::OrderId)
                        .from(sub_order::Entity)
                        .and_where(Expr::col(sub_order::Column::VendorId).eq(vendor_id))
                        .to_owned(),
                ),
            );
        }
        if let Some(from) = filters.from {
            condition = condition.add(order::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filters.to {
            condition = condition.add(order::Column::CreatedAt.lte(to));
        }

        let query = order::Entity::find().filter(condition);
        let query = if sort.descending {
            query.order_by_desc(sort.column())
        } else {
            query.order_by_asc(sort.column())
        };
        let paginator = query.paginate(db, limit.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let totals: HashMap<Uuid, Decimal> = if ids.is_empty() {
            HashMap::new()
        } else {
            order_payment::Entity::find()
                .filter(order_payment::Column::OrderId.is_in(ids))
                .all(db)
                .await?
                .into_iter()
                .map(|p| (p.order_id, p.total))
                .collect()
        };

        let summaries = orders
            .into_iter()
            .map(|o| OrderSummary {
                total_amount: totals.get(&o.id).copied().unwrap_or(Decimal::ZERO),
                id: o.id,
                order_number: o.order_number,
                user_id: o.user_id,
                vendor_id: o.vendor_id,
                status: o.status,
                payment_status: o.payment_status,
                payment_gateway: o.payment_gateway,
                order_type: o.order_type,
                created_at: o.created_at,
            })
            .collect();
        Ok((summaries, total))
    }

    /// Cancels an order and puts its stock back. `actor` is recorded on the
    /// audit trail.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        actor: &str,
    ) -> Result<CancelResult, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        match order.status {
            OrderStatus::Canceled => {
                return Err(ServiceError::BadRequest("Order already canceled".to_string()))
            }
            OrderStatus::Returned => {
                return Err(ServiceError::BadRequest(
                    "Returned orders cannot be canceled".to_string(),
                ))
            }
            OrderStatus::Delivered => warn!(
                order_id = %order_id,
                "canceling a delivered order; refund needs manual review"
            ),
            _ => {}
        }

        let now = Utc::now();
        let flipped = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Canceled))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.ne(OrderStatus::Canceled))
            .exec(&txn)
            .await?;
        if flipped.rows_affected == 0 {
            return Err(ServiceError::BadRequest("Order already canceled".to_string()));
        }

        sub_order::Entity::update_many()
            .col_expr(sub_order::Column::Status, Expr::value(OrderStatus::Canceled))
            .col_expr(sub_order::Column::UpdatedAt, Expr::value(now))
            .filter(sub_order::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;

        order_track::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            name: Set(order_track::CANCELED.to_string()),
            actor: Set(actor.to_string()),
            note: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        let restored: Vec<StockLine> = items
            .iter()
            .map(|item| StockLine {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
            })
            .collect();
        for line in &restored {
            inventory::restore(&txn, *line).await?;
        }

        txn.commit().await?;

        cache::invalidate(self.cache.as_ref(), &keys::order(order_id)).await;
        counter!("gemstore_orders_canceled_total", 1);
        for line in restored {
            cache::invalidate(self.cache.as_ref(), &keys::product(line.product_id)).await;
            self.event_sender
                .send_or_log(Event::InventoryRestored {
                    product_id: line.product_id,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::OrderCancelled {
                order_id,
                previous_status: order.status.to_string(),
            })
            .await;
        info!(order_id = %order_id, previous = %order.status, "order canceled");

        Ok(CancelResult {
            order_id,
            status: OrderStatus::Canceled,
        })
    }

    /// Stores a checkout snapshot for a later `create_order`.
    pub async fn create_session(
        &self,
        snapshot: serde_json::Value,
    ) -> Result<order_sessions::OrderSessionCreated, ServiceError> {
        let session = order_sessions::create(&*self.db_pool, snapshot).await?;
        Ok(order_sessions::OrderSessionCreated {
            order_session_id: session.id,
        })
    }
}
