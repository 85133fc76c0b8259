use chrono::Utc;
use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::cache::{self, keys, CacheBackend};
use crate::db::soft_delete::{soft_delete_by_id, soft_delete_where};
use crate::db::{DbPool, SoftDelete};
use crate::entities::{inventory, inventory_detail, inventory_detail_attribute, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::calculator::validate_money;

const SLUG_ATTEMPTS: u32 = 10;

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lower-case, hyphen separated form of a product name
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let slug = NON_SLUG_CHARS.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "product".to_string()
    } else {
        slug.to_string()
    }
}

fn validate_tax_rate(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() || *value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("tax_rate_out_of_range"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AttributeInput {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VariantInput {
    pub sku: Option<String>,
    #[validate(custom = "validate_money")]
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    #[serde(default)]
    pub attributes: Vec<AttributeInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct InventoryInput {
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    #[validate(custom = "validate_money")]
    #[schema(value_type = String, example = "1200.00")]
    pub price: Decimal,
    #[validate(custom = "validate_money")]
    #[schema(value_type = Option<String>)]
    pub sale_price: Option<Decimal>,
    #[validate(custom = "validate_tax_rate")]
    #[serde(default)]
    #[schema(value_type = String, example = "3")]
    pub tax_rate: Decimal,
    pub vendor_id: Option<Uuid>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[validate]
    pub inventory: Option<InventoryInput>,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "validate_money")]
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[validate(custom = "validate_money")]
    #[schema(value_type = Option<String>)]
    pub sale_price: Option<Decimal>,
    #[validate(custom = "validate_tax_rate")]
    #[schema(value_type = Option<String>)]
    pub tax_rate: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VariantDetail {
    pub variant: inventory_detail::Model,
    pub attributes: Vec<inventory_detail_attribute::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductDetail {
    pub product: product::Model,
    pub inventory: Option<inventory::Model>,
    pub variants: Vec<VariantDetail>,
}

/// Catalog reads and admin writes
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    cache: Arc<dyn CacheBackend>,
    event_sender: Arc<EventSender>,
    cache_ttl: Duration,
}

impl ProductService {
    pub fn new(
        db_pool: Arc<DbPool>,
        cache: Arc<dyn CacheBackend>,
        event_sender: Arc<EventSender>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            db_pool,
            cache,
            event_sender,
            cache_ttl,
        }
    }

    /// First free slug among `base`, `base-2` .. `base-10`, then a random suffix.
    async fn unique_slug<C: ConnectionTrait>(conn: &C, name: &str) -> Result<String, ServiceError> {
        let base = slugify(name);
        for attempt in 1..=SLUG_ATTEMPTS {
            let candidate = if attempt == 1 {
                base.clone()
            } else {
                format!("{}-{}", base, attempt)
            };
            let taken = product::Entity::find()
                .filter(product::Column::Slug.eq(candidate.as_str()))
                .count(conn)
                .await?;
            if taken == 0 {
                return Ok(candidate);
            }
        }
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        Ok(format!("{}-{}", base, suffix))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: CreateProductRequest) -> Result<ProductDetail, ServiceError> {
        request.validate()?;
        for variant in &request.variants {
            variant.validate()?;
            for attribute in &variant.attributes {
                attribute.validate()?;
            }
        }

        let now = Utc::now();
        let txn = self.db_pool.begin().await?;
        let slug = Self::unique_slug(&txn, &request.name).await?;

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            slug: Set(slug),
            sku: Set(request.sku.clone()),
            description: Set(request.description.clone()),
            price: Set(request.price),
            sale_price: Set(request.sale_price),
            tax_rate: Set(request.tax_rate),
            vendor_id: Set(request.vendor_id),
            is_active: Set(request.is_active),
            created_at: Set(now),
            updated_at: Set(None),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let inventory = match &request.inventory {
            Some(input) => Some(
                inventory::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product.id),
                    stock: Set(input.stock),
                    sold: Set(0),
                    created_at: Set(now),
                    updated_at: Set(None),
                    deleted_at: Set(None),
                }
                .insert(&txn)
                .await?,
            ),
            None => None,
        };

        let mut variants = Vec::with_capacity(request.variants.len());
        for input in &request.variants {
            let variant = inventory_detail::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product.id),
                sku: Set(input.sku.clone()),
                price: Set(input.price),
                stock: Set(input.stock),
                sold: Set(0),
                created_at: Set(now),
                updated_at: Set(None),
                deleted_at: Set(None),
            }
            .insert(&txn)
            .await?;

            let mut attributes = Vec::with_capacity(input.attributes.len());
            for attribute in &input.attributes {
                attributes.push(
                    inventory_detail_attribute::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        inventory_detail_id: Set(variant.id),
                        name: Set(attribute.name.clone()),
                        value: Set(attribute.value.clone()),
                        created_at: Set(now),
                        deleted_at: Set(None),
                    }
                    .insert(&txn)
                    .await?,
                );
            }
            variants.push(VariantDetail {
                variant,
                attributes,
            });
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;
        info!(product_id = %product.id, slug = %product.slug, "product created");

        Ok(ProductDetail {
            product,
            inventory,
            variants,
        })
    }

    /// Live product with its stock and variants, read through the cache.
    pub async fn get(&self, id: Uuid) -> Result<ProductDetail, ServiceError> {
        let key = keys::product(id);
        if let Some(hit) = cache::get_json::<ProductDetail>(self.cache.as_ref(), &key).await {
            return Ok(hit);
        }

        let db = &*self.db_pool;
        let product = product::Entity::find_live_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let inventory = inventory::Entity::find_live()
            .filter(inventory::Column::ProductId.eq(id))
            .one(db)
            .await?;
        let details = inventory_detail::Entity::find_live()
            .filter(inventory_detail::Column::ProductId.eq(id))
            .order_by_asc(inventory_detail::Column::CreatedAt)
            .all(db)
            .await?;
        let detail_ids: Vec<Uuid> = details.iter().map(|d| d.id).collect();
        let mut attributes = if detail_ids.is_empty() {
            Vec::new()
        } else {
            inventory_detail_attribute::Entity::find_live()
                .filter(inventory_detail_attribute::Column::InventoryDetailId.is_in(detail_ids))
                .all(db)
                .await?
        };

        let variants = details
            .into_iter()
            .map(|variant| {
                let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut attributes)
                    .into_iter()
                    .partition(|a| a.inventory_detail_id == variant.id);
                attributes = rest;
                VariantDetail {
                    variant,
                    attributes: mine,
                }
            })
            .collect();

        let detail = ProductDetail {
            product,
            inventory,
            variants,
        };
        cache::put_json(self.cache.as_ref(), &key, &detail, self.cache_ttl).await;
        Ok(detail)
    }

    /// Active, live products, newest first
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
        vendor_id: Option<Uuid>,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut condition = Condition::all().add(product::Column::IsActive.eq(true));
        if let Some(vendor_id) = vendor_id {
            condition = condition.add(product::Column::VendorId.eq(vendor_id));
        }
        let paginator = product::Entity::find_live()
            .filter(condition)
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db_pool, limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;
        let existing = product::Entity::find_live_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let mut model: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(description) = request.description {
            model.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            model.price = Set(price);
        }
        if let Some(sale_price) = request.sale_price {
            model.sale_price = Set(Some(sale_price));
        }
        if let Some(tax_rate) = request.tax_rate {
            model.tax_rate = Set(tax_rate);
        }
        if let Some(active) = request.is_active {
            model.is_active = Set(active);
        }
        model.updated_at = Set(Some(Utc::now()));

        let updated = model.update(&*self.db_pool).await?;
        cache::invalidate(self.cache.as_ref(), &keys::product(id)).await;
        Ok(updated)
    }

    /// Soft-deletes the product together with its stock rows, variants and
    /// variant attributes.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;

        if !soft_delete_by_id::<product::Entity, _>(&txn, id).await? {
            return Err(ServiceError::NotFound("Product not found".to_string()));
        }
        soft_delete_where::<inventory::Entity, _>(
            &txn,
            Condition::all().add(inventory::Column::ProductId.eq(id)),
        )
        .await?;

        let detail_ids: Vec<Uuid> = inventory_detail::Entity::find()
            .filter(inventory_detail::Column::ProductId.eq(id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        if !detail_ids.is_empty() {
            soft_delete_where::<inventory_detail_attribute::Entity, _>(
                &txn,
                Condition::all()
                    .add(inventory_detail_attribute::Column::InventoryDetailId.is_in(detail_ids)),
            )
            .await?;
        }
        soft_delete_where::<inventory_detail::Entity, _>(
            &txn,
            Condition::all().add(inventory_detail::Column::ProductId.eq(id)),
        )
        .await?;

        txn.commit().await?;

        cache::invalidate(self.cache.as_ref(), &keys::product(id)).await;
        self.event_sender.send_or_log(Event::ProductDeleted(id)).await;
        info!(product_id = %id, "product deleted");
        Ok(())
    }
}
