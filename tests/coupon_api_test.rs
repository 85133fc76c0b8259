mod common;

use axum::http::{Method, StatusCode};
use common::{line, money, order_body, TestApp};
use gemstore_api::{
    auth::consts as perm,
    entities::DiscountType,
    services::coupons::CreateCouponRequest,
};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn validate_reports_rejections_in_a_successful_response() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/coupon/validate",
            Some(json!({ "code": "NOPE", "orderTotal": "100" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["message"], "Coupon not found");
}

#[tokio::test]
async fn validate_computes_the_discount_for_a_live_coupon() {
    let app = TestApp::new().await;
    app.seed_coupon("SPARKLE15", DiscountType::Percentage, dec!(15), None)
        .await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/coupon/validate",
            Some(json!({ "code": "sparkle15", "orderTotal": "200" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(money(&body["data"]["discount"]), dec!(30));
    assert_eq!(body["data"]["coupon"]["code"], "SPARKLE15");
}

#[tokio::test]
async fn minimum_order_amount_is_enforced() {
    let app = TestApp::new().await;
    app.state
        .services
        .coupons
        .create(CreateCouponRequest {
            code: "BIGSPEND".into(),
            description: None,
            discount_type: DiscountType::Flat,
            value: dec!(50),
            min_order_amount: Some(dec!(500)),
            max_discount: None,
            usage_limit: None,
            valid_from: None,
            valid_to: None,
            is_active: true,
            vendor_id: None,
        })
        .await
        .unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/order/apply-coupon",
            Some(json!({ "code": "BIGSPEND", "orderTotal": "120" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Minimum order amount is 500.00");
}

#[tokio::test]
async fn apply_coupon_previews_without_redeeming() {
    let app = TestApp::new().await;
    let coupon = app
        .seed_coupon("FLAT25", DiscountType::Flat, dec!(25), Some(1))
        .await;

    for _ in 0..2 {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/order/apply-coupon",
                Some(json!({
                    "code": "FLAT25",
                    "orderTotal": "80",
                    "userEmail": "preview@example.com"
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(money(&body["data"]["discount"]), dec!(25));
    }

    let stored = app.state.services.coupons.get(coupon.id).await.unwrap();
    assert_eq!(stored.used_count, 0);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/order/apply-coupon",
            Some(json!({ "code": "MISSING", "orderTotal": "80" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Coupon not found");
}

#[tokio::test]
async fn order_with_coupon_discounts_the_total_and_blocks_reuse() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100), dec!(0), None, Some(10)).await;
    let coupon = app
        .seed_coupon("WELCOME", DiscountType::Flat, dec!(25), None)
        .await;

    let mut body = order_body("loyal@example.com", vec![line(product.product.id, 2, "100")]);
    body["coupon_code"] = json!("welcome");
    let (status, created) = app
        .send(Method::POST, "/api/order", Some(body.clone()), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(money(&created["data"]["total_amount"]), dec!(175));

    let order_id: Uuid = created["data"]["order_id"].as_str().unwrap().parse().unwrap();
    let detail = app.state.services.orders.get_order(order_id).await.unwrap();
    assert_eq!(detail.order.coupon_code.as_deref(), Some("WELCOME"));
    assert_eq!(detail.order.coupon_amount, dec!(25));

    let (status, error) = app.send(Method::POST, "/api/order", Some(body), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "Coupon already used");

    // the rejected order left stock and the counter alone
    let inventory = app
        .state
        .services
        .products
        .get(product.product.id)
        .await
        .unwrap()
        .inventory
        .unwrap();
    assert_eq!(inventory.stock, 8);
    assert_eq!(
        app.state.services.coupons.get(coupon.id).await.unwrap().used_count,
        1
    );

    let (_, verdict) = app
        .send(
            Method::POST,
            "/api/coupon/validate",
            Some(json!({
                "code": "WELCOME",
                "orderTotal": "200",
                "userEmail": "loyal@example.com"
            })),
            None,
        )
        .await;
    assert_eq!(verdict["data"]["valid"], false);
    assert_eq!(verdict["data"]["message"], "Coupon already used");
}

#[tokio::test]
async fn usage_limit_is_shared_across_buyers() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(60), dec!(0), None, None).await;
    app.seed_coupon("ONCE", DiscountType::Percentage, dec!(10), Some(1))
        .await;

    let mut first = order_body("first@example.com", vec![line(product.product.id, 1, "60")]);
    first["coupon_code"] = json!("ONCE");
    app.place_order(first).await;

    let mut second = order_body("second@example.com", vec![line(product.product.id, 1, "60")]);
    second["coupon_code"] = json!("ONCE");
    let (status, error) = app.send(Method::POST, "/api/order", Some(second), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "Coupon usage limit reached");
}

#[tokio::test]
async fn vendor_coupon_discounts_only_that_vendors_lines() {
    let app = TestApp::new().await;
    let vendor = Uuid::new_v4();
    let theirs = app.seed_product(dec!(100), dec!(0), Some(vendor), None).await;
    let ours = app.seed_product(dec!(300), dec!(0), None, None).await;
    app.state
        .services
        .coupons
        .create(CreateCouponRequest {
            code: "VENDOR50".into(),
            description: Some("Half off one atelier".into()),
            discount_type: DiscountType::Percentage,
            value: dec!(50),
            min_order_amount: None,
            max_discount: None,
            usage_limit: None,
            valid_from: None,
            valid_to: None,
            is_active: true,
            vendor_id: Some(vendor),
        })
        .await
        .unwrap();

    let mut body = order_body(
        "atelier@example.com",
        vec![
            line(theirs.product.id, 1, "100"),
            line(ours.product.id, 1, "300"),
        ],
    );
    body["coupon_code"] = json!("VENDOR50");
    let (status, created) = app.send(Method::POST, "/api/order", Some(body), None).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(money(&created["data"]["total_amount"]), dec!(350));

    let mut without_vendor = order_body("other@example.com", vec![line(ours.product.id, 1, "300")]);
    without_vendor["coupon_code"] = json!("VENDOR50");
    let (status, error) = app
        .send(Method::POST, "/api/order", Some(without_vendor), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "Coupon is not applicable to this order");
}

#[tokio::test]
async fn coupon_management_lifecycle() {
    let app = TestApp::new().await;
    let token = app.token_with(&[perm::COUPONS_MANAGE]).await;
    let payload = json!({
        "code": "holiday-20",
        "discount_type": "percentage",
        "value": "20",
        "max_discount": "40",
        "usage_limit": 100
    });

    let (status, _) = app
        .send(Method::POST, "/api/coupon", Some(payload.clone()), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = app
        .send(Method::POST, "/api/coupon", Some(payload.clone()), Some(&token))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["data"]["code"], "HOLIDAY-20");
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, duplicate) = app
        .send(Method::POST, "/api/coupon", Some(payload), Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate["message"], "Coupon code already exists");

    let (status, listed) = app
        .send(Method::GET, "/api/coupon?page=1&limit=10", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"]["total"], 1);

    let (status, updated) = app
        .send(
            Method::PUT,
            &format!("/api/coupon/{id}"),
            Some(json!({ "value": "25" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(money(&updated["data"]["value"]), dec!(25));

    // cap applies: 25% of 400 is 100, capped at 40
    let (_, verdict) = app
        .send(
            Method::POST,
            "/api/coupon/validate",
            Some(json!({ "code": "HOLIDAY-20", "orderTotal": "400" })),
            None,
        )
        .await;
    assert_eq!(money(&verdict["data"]["discount"]), dec!(40));

    let (status, deleted) = app
        .send(Method::DELETE, &format!("/api/coupon/{id}"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["message"], "Coupon deleted");

    let (status, _) = app
        .send(Method::GET, &format!("/api/coupon/{id}"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, verdict) = app
        .send(
            Method::POST,
            "/api/coupon/validate",
            Some(json!({ "code": "HOLIDAY-20", "orderTotal": "400" })),
            None,
        )
        .await;
    assert_eq!(verdict["data"]["valid"], false);
}

#[tokio::test]
async fn invalid_coupon_definitions_are_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/coupon",
            Some(json!({ "code": "TOOMUCH", "discount_type": "percentage", "value": "150" })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Percentage discount cannot exceed 100");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/coupon",
            Some(json!({ "code": "no spaces", "discount_type": "flat", "value": "5" })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
}

#[tokio::test]
async fn oversized_order_totals_are_rejected_on_both_check_endpoints() {
    let app = TestApp::new().await;
    app.seed_coupon("BIG10", DiscountType::Percentage, dec!(10), None)
        .await;

    for uri in ["/api/coupon/validate", "/api/order/apply-coupon"] {
        let (status, body) = app
            .send(
                Method::POST,
                uri,
                Some(json!({ "code": "BIG10", "orderTotal": "79228162514264337593543950335" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {body}");
        assert_eq!(body["success"], false);
        assert!(
            body["details"]
                .as_array()
                .unwrap()
                .iter()
                .any(|d| d.as_str().is_some_and(|d| d.ends_with("amount_too_large"))),
            "{uri}: {body}"
        );
    }
}
