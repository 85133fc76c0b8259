use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::cache::{self, keys, CacheBackend};
use crate::db::soft_delete::soft_delete_by_id;
use crate::db::{DbPool, SoftDelete};
use crate::entities::coupon::{self, DiscountType};
use crate::entities::user_coupon;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::calculator::{round2, validate_money, VendorGroup};
use crate::services::users;

/// Reasons a coupon cannot be applied, in the order they are checked
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponRejection {
    #[error("Coupon not found")]
    NotFound,
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon is not yet valid")]
    NotYetValid,
    #[error("Coupon has expired")]
    Expired,
    #[error("Minimum order amount is {0:.2}")]
    BelowMinimum(Decimal),
    #[error("Coupon already used")]
    AlreadyUsed,
    #[error("Coupon usage limit reached")]
    UsageLimitReached,
    #[error("Coupon is not applicable to this order")]
    NotApplicable,
}

impl From<CouponRejection> for ServiceError {
    fn from(rejection: CouponRejection) -> Self {
        ServiceError::BadRequest(rejection.to_string())
    }
}

/// Checks everything after existence. `already_used` is whether the buyer
/// has redeemed this coupon before.
pub fn check_eligibility(
    coupon: &coupon::Model,
    order_total: Decimal,
    now: DateTime<Utc>,
    already_used: bool,
) -> Result<(), CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.valid_from.map_or(false, |from| now < from) {
        return Err(CouponRejection::NotYetValid);
    }
    if coupon.valid_to.map_or(false, |to| now > to) {
        return Err(CouponRejection::Expired);
    }
    if let Some(min) = coupon.min_order_amount {
        if order_total < min {
            return Err(CouponRejection::BelowMinimum(round2(min)));
        }
    }
    if already_used {
        return Err(CouponRejection::AlreadyUsed);
    }
    if coupon
        .usage_limit
        .map_or(false, |limit| coupon.used_count >= limit)
    {
        return Err(CouponRejection::UsageLimitReached);
    }
    Ok(())
}

/// Discount for `order_total`, never more than the total itself
pub fn compute_discount(coupon: &coupon::Model, order_total: Decimal) -> Decimal {
    let total = order_total.max(Decimal::ZERO);
    let raw = match coupon.discount_type {
        DiscountType::Flat => coupon.value.min(total),
        DiscountType::Percentage => {
            // an overflowing percentage is at least the total, which caps it anyway
            let pct = total
                .checked_mul(coupon.value)
                .map(|scaled| scaled / Decimal::ONE_HUNDRED)
                .or_else(|| (total / Decimal::ONE_HUNDRED).checked_mul(coupon.value))
                .unwrap_or(total);
            let capped = match coupon.max_discount {
                Some(cap) => pct.min(cap),
                None => pct,
            };
            capped.min(total)
        }
    };
    round2(raw.max(Decimal::ZERO))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppliedCoupon {
    #[schema(value_type = String, example = "25.00")]
    pub discount: Decimal,
    pub coupon: coupon::Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CouponValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<coupon::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub discount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn validate_code(code: &str) -> Result<(), ValidationError> {
    if code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_coupon_code"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCouponRequest {
    #[validate(
        length(min = 3, max = 64, message = "Code must be 3 to 64 characters"),
        custom = "validate_code"
    )]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(custom = "validate_money")]
    #[schema(value_type = String, example = "10")]
    pub value: Decimal,
    #[validate(custom = "validate_money")]
    #[schema(value_type = Option<String>)]
    pub min_order_amount: Option<Decimal>,
    #[validate(custom = "validate_money")]
    #[schema(value_type = Option<String>)]
    pub max_discount: Option<Decimal>,
    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub vendor_id: Option<Uuid>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCouponRequest {
    pub description: Option<String>,
    #[validate(custom = "validate_money")]
    #[schema(value_type = Option<String>)]
    pub value: Option<Decimal>,
    #[validate(custom = "validate_money")]
    #[schema(value_type = Option<String>)]
    pub min_order_amount: Option<Decimal>,
    #[validate(custom = "validate_money")]
    #[schema(value_type = Option<String>)]
    pub max_discount: Option<Decimal>,
    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

fn check_rules(
    discount_type: DiscountType,
    value: Decimal,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
) -> Result<(), ServiceError> {
    if discount_type == DiscountType::Percentage && value > Decimal::ONE_HUNDRED {
        return Err(ServiceError::ValidationError(
            "Percentage discount cannot exceed 100".to_string(),
        ));
    }
    if let (Some(from), Some(to)) = (valid_from, valid_to) {
        if from > to {
            return Err(ServiceError::ValidationError(
                "valid_from must be before valid_to".to_string(),
            ));
        }
    }
    Ok(())
}

/// Coupon validation, redemption and admin management
#[derive(Clone)]
pub struct CouponService {
    db_pool: Arc<DbPool>,
    cache: Arc<dyn CacheBackend>,
    event_sender: Arc<EventSender>,
    cache_ttl: Duration,
}

impl CouponService {
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

    async fn find_live_by_code<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<Option<coupon::Model>, ServiceError> {
        Ok(coupon::Entity::find_live()
            .filter(coupon::Column::Code.eq(code.trim().to_uppercase()))
            .one(conn)
            .await?)
    }

    /// Read-through lookup for the public endpoints
    async fn lookup_cached(&self, code: &str) -> Result<Option<coupon::Model>, ServiceError> {
        let key = keys::coupon(code.trim());
        if let Some(hit) = cache::get_json::<coupon::Model>(self.cache.as_ref(), &key).await {
            return Ok(Some(hit));
        }
        let found = Self::find_live_by_code(&*self.db_pool, code).await?;
        if let Some(model) = &found {
            cache::put_json(self.cache.as_ref(), &key, model, self.cache_ttl).await;
        }
        Ok(found)
    }

    async fn already_used<C: ConnectionTrait>(
        conn: &C,
        coupon_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        let Some(user_id) = user_id else {
            return Ok(false);
        };
        let count = user_coupon::Entity::find()
            .filter(user_coupon::Column::UserId.eq(user_id))
            .filter(user_coupon::Column::CouponId.eq(coupon_id))
            .count(conn)
            .await?;
        Ok(count > 0)
    }

    /// Outer error is infrastructure, inner is the business verdict.
    async fn evaluate(
        &self,
        code: &str,
        order_total: Decimal,
        user_email: Option<&str>,
    ) -> Result<Result<coupon::Model, CouponRejection>, ServiceError> {
        let Some(coupon) = self.lookup_cached(code).await? else {
            return Ok(Err(CouponRejection::NotFound));
        };
        let user_id = match user_email {
            Some(email) => users::find_by_email(&*self.db_pool, email)
                .await?
                .map(|u| u.id),
            None => None,
        };
        let used = Self::already_used(&*self.db_pool, coupon.id, user_id).await?;
        Ok(check_eligibility(&coupon, order_total, Utc::now(), used).map(|_| coupon))
    }

    /// Dry-run used by the public validate endpoint. Rejections are reported
    /// in the body, not as errors.
    #[instrument(skip(self, user_email))]
    pub async fn validate_for(
        &self,
        code: &str,
        order_total: Decimal,
        user_email: Option<&str>,
    ) -> Result<CouponValidation, ServiceError> {
        match self.evaluate(code, order_total, user_email).await? {
            Ok(coupon) => Ok(CouponValidation {
                valid: true,
                discount: Some(compute_discount(&coupon, order_total)),
                coupon: Some(coupon),
                message: None,
            }),
            Err(rejection) => Ok(CouponValidation {
                valid: false,
                coupon: None,
                discount: None,
                message: Some(rejection.to_string()),
            }),
        }
    }

    /// Computes the discount a coupon would give without redeeming it.
    #[instrument(skip(self, user_email))]
    pub async fn preview(
        &self,
        code: &str,
        order_total: Decimal,
        user_email: Option<&str>,
    ) -> Result<AppliedCoupon, ServiceError> {
        let coupon = self.evaluate(code, order_total, user_email).await??;
        Ok(AppliedCoupon {
            discount: compute_discount(&coupon, order_total),
            coupon,
        })
    }

    /// Validates against the whole cart, computes the discount on the
    /// eligible part and redeems. Runs on the order transaction.
    pub async fn apply_to_order<C: ConnectionTrait>(
        conn: &C,
        code: &str,
        groups: &[VendorGroup],
        subtotal: Decimal,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<AppliedCoupon, ServiceError> {
        let coupon = Self::find_live_by_code(conn, code)
            .await?
            .ok_or(CouponRejection::NotFound)?;
        let used = Self::already_used(conn, coupon.id, Some(user_id)).await?;
        check_eligibility(&coupon, subtotal, Utc::now(), used)?;

        let base = match coupon.vendor_id {
            None => subtotal,
            Some(vendor_id) => groups
                .iter()
                .find(|g| g.vendor_id == Some(vendor_id))
                .map(VendorGroup::subtotal)
                .ok_or(CouponRejection::NotApplicable)?,
        };
        let discount = compute_discount(&coupon, base);

        Self::redeem(conn, coupon.id, user_id, order_id).await?;
        Ok(AppliedCoupon { discount, coupon })
    }

    /// Claims one use of the coupon for `user_id`. Both halves are single
    /// statements guarded by the database.
    pub async fn redeem<C: ConnectionTrait>(
        conn: &C,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let claimed = coupon::Entity::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .filter(coupon::Column::Id.eq(coupon_id))
            .filter(
                Condition::any()
                    .add(coupon::Column::UsageLimit.is_null())
                    .add(
                        Expr::col(coupon::Column::UsedCount)
                            .lt(Expr::col(coupon::Column::UsageLimit)),
                    ),
            )
            .exec(conn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(CouponRejection::UsageLimitReached.into());
        }

        let redemption = user_coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            coupon_id: Set(coupon_id),
            order_id: Set(order_id),
            created_at: Set(Utc::now()),
        };
        match redemption.insert(conn).await {
            Ok(_) => Ok(()),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    Err(CouponRejection::AlreadyUsed.into())
                }
                _ => Err(err.into()),
            },
        }
    }

    /// Drops the cached copy so the next read sees the new `used_count`.
    pub async fn forget(&self, code: &str) {
        cache::invalidate(self.cache.as_ref(), &keys::coupon(code)).await;
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create(&self, request: CreateCouponRequest) -> Result<coupon::Model, ServiceError> {
        request.validate()?;
        check_rules(
            request.discount_type,
            request.value,
            request.valid_from,
            request.valid_to,
        )?;

        let code = request.code.trim().to_uppercase();
        let now = Utc::now();
        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            description: Set(request.description),
            discount_type: Set(request.discount_type),
            value: Set(request.value),
            min_order_amount: Set(request.min_order_amount),
            max_discount: Set(request.max_discount),
            usage_limit: Set(request.usage_limit),
            used_count: Set(0),
            valid_from: Set(request.valid_from),
            valid_to: Set(request.valid_to),
            is_active: Set(request.is_active),
            vendor_id: Set(request.vendor_id),
            created_at: Set(now),
            updated_at: Set(None),
            deleted_at: Set(None),
        };

        let created = match model.insert(&*self.db_pool).await {
            Ok(created) => created,
            Err(err) => {
                return match err.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => Err(ServiceError::BadRequest(
                        "Coupon code already exists".to_string(),
                    )),
                    _ => Err(err.into()),
                }
            }
        };

        self.forget(&code).await;
        self.event_sender
            .send_or_log(Event::CouponCreated(created.id))
            .await;
        info!(coupon_id = %created.id, "coupon created");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<coupon::Model, ServiceError> {
        coupon::Entity::find_live_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Coupon not found".to_string()))
    }

    pub async fn list(&self, page: u64, limit: u64) -> Result<(Vec<coupon::Model>, u64), ServiceError> {
        let paginator = coupon::Entity::find_live()
            .order_by_desc(coupon::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCouponRequest,
    ) -> Result<coupon::Model, ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;
        check_rules(
            existing.discount_type,
            request.value.unwrap_or(existing.value),
            request.valid_from.or(existing.valid_from),
            request.valid_to.or(existing.valid_to),
        )?;

        let code = existing.code.clone();
        let mut model: coupon::ActiveModel = existing.into();
        if let Some(description) = request.description {
            model.description = Set(Some(description));
        }
        if let Some(value) = request.value {
            model.value = Set(value);
        }
        if let Some(min) = request.min_order_amount {
            model.min_order_amount = Set(Some(min));
        }
        if let Some(cap) = request.max_discount {
            model.max_discount = Set(Some(cap));
        }
        if let Some(limit) = request.usage_limit {
            model.usage_limit = Set(Some(limit));
        }
        if let Some(from) = request.valid_from {
            model.valid_from = Set(Some(from));
        }
        if let Some(to) = request.valid_to {
            model.valid_to = Set(Some(to));
        }
        if let Some(active) = request.is_active {
            model.is_active = Set(active);
        }
        model.updated_at = Set(Some(Utc::now()));

        let updated = model.update(&*self.db_pool).await?;
        self.forget(&code).await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        if !soft_delete_by_id::<coupon::Entity, _>(&*self.db_pool, id).await? {
            return Err(ServiceError::NotFound("Coupon not found".to_string()));
        }
        self.forget(&existing.code).await;
        self.event_sender.send_or_log(Event::CouponDeleted(id)).await;
        warn!(coupon_id = %id, code = %existing.code, "coupon deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration as ChronoDuration;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn coupon(discount_type: DiscountType, value: Decimal) -> coupon::Model {
        coupon::Model {
            id: Uuid::new_v4(),
            code: "GEM10".into(),
            description: None,
            discount_type,
            value,
            min_order_amount: None,
            max_discount: None,
            usage_limit: None,
            used_count: 0,
            valid_from: None,
            valid_to: None,
            is_active: true,
            vendor_id: None,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    #[rstest]
    #[case(DiscountType::Flat, dec!(20), None, dec!(100), dec!(20))]
    #[case(DiscountType::Flat, dec!(150), None, dec!(100), dec!(100))]
    #[case(DiscountType::Percentage, dec!(10), None, dec!(250), dec!(25))]
    #[case(DiscountType::Percentage, dec!(50), Some(dec!(30)), dec!(100), dec!(30))]
    #[case(DiscountType::Percentage, dec!(15), None, dec!(33.33), dec!(5))]
    fn discount_rules(
        #[case] kind: DiscountType,
        #[case] value: Decimal,
        #[case] cap: Option<Decimal>,
        #[case] total: Decimal,
        #[case] expected: Decimal,
    ) {
        let mut c = coupon(kind, value);
        c.max_discount = cap;
        assert_eq!(compute_discount(&c, total), expected);
    }

    #[test]
    fn percentage_of_an_enormous_total_does_not_overflow() {
        let c = coupon(DiscountType::Percentage, dec!(10));
        let discount = compute_discount(&c, Decimal::MAX);
        assert!(discount > Decimal::ZERO && discount <= Decimal::MAX);
    }

    #[test]
    fn checks_run_in_documented_order() {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Flat, dec!(5));
        c.is_active = false;
        c.valid_to = Some(now - ChronoDuration::days(1));
        assert_eq!(
            check_eligibility(&c, dec!(100), now, true),
            Err(CouponRejection::Inactive)
        );

        c.is_active = true;
        assert_eq!(
            check_eligibility(&c, dec!(100), now, true),
            Err(CouponRejection::Expired)
        );

        c.valid_to = None;
        c.valid_from = Some(now + ChronoDuration::days(1));
        assert_eq!(
            check_eligibility(&c, dec!(100), now, false),
            Err(CouponRejection::NotYetValid)
        );

        c.valid_from = None;
        c.min_order_amount = Some(dec!(500));
        assert_eq!(
            check_eligibility(&c, dec!(100), now, true),
            Err(CouponRejection::BelowMinimum(dec!(500)))
        );

        c.min_order_amount = None;
        c.usage_limit = Some(1);
        c.used_count = 1;
        assert_eq!(
            check_eligibility(&c, dec!(100), now, true),
            Err(CouponRejection::AlreadyUsed)
        );
        assert_eq!(
            check_eligibility(&c, dec!(100), now, false),
            Err(CouponRejection::UsageLimitReached)
        );
    }

    #[test]
    fn rejection_maps_to_bad_request_with_verbatim_message() {
        let err: ServiceError = CouponRejection::BelowMinimum(dec!(50.00)).into();
        assert_matches!(err, ServiceError::BadRequest(ref msg) if msg == "Minimum order amount is 50.00");
    }

    #[test]
    fn percentage_over_hundred_is_rejected() {
        assert_matches!(
            check_rules(DiscountType::Percentage, dec!(120), None, None),
            Err(ServiceError::ValidationError(_))
        );
        assert!(check_rules(DiscountType::Flat, dec!(120), None, None).is_ok());
    }

    fn money() -> impl Strategy<Value = Decimal> {
        (0i64..100_000_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #[test]
        fn flat_discount_never_exceeds_total(value in money(), total in money()) {
            let c = coupon(DiscountType::Flat, value);
            prop_assert!(compute_discount(&c, total) <= total);
        }

        #[test]
        fn percentage_discount_respects_cap(pct in 0u32..=100, cap in money(), total in money()) {
            let mut c = coupon(DiscountType::Percentage, Decimal::from(pct));
            c.max_discount = Some(cap);
            let discount = compute_discount(&c, total);
            prop_assert!(discount <= round2(cap));
            prop_assert!(discount <= total);
        }

        #[test]
        fn discount_is_idempotent(pct in 0u32..=100, total in money()) {
            let c = coupon(DiscountType::Percentage, Decimal::from(pct));
            prop_assert_eq!(compute_discount(&c, total), compute_discount(&c, total));
        }
    }
}
