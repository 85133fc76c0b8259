mod common;

use axum::http::{Method, StatusCode};
use common::{line, money, order_body, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn single_vendor_order_totals_include_tax_and_taxed_shipping() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100), dec!(10), None, Some(5)).await;
    let product_id = product.product.id;

    let mut body = order_body("ada@example.com", vec![line(product_id, 2, "100.00")]);
    body["shipping"] = json!({ "admin": { "cost": "10" } });

    let (status, created) = app.send(Method::POST, "/api/order", Some(body), None).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["success"], true);
    assert_eq!(money(&created["data"]["total_amount"]), dec!(231));
    assert!(created["data"]["order_number"]
        .as_str()
        .is_some_and(|n| n.starts_with("ORD")));
    assert!(created["data"]["invoice_number"]
        .as_str()
        .is_some_and(|n| n.starts_with("INV")));

    let order_id = created["data"]["order_id"].as_str().unwrap();
    let (status, detail) = app
        .send(Method::GET, &format!("/api/order/{order_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = &detail["data"];
    assert_eq!(data["order"]["status"], "pending");
    assert_eq!(data["order"]["payment_status"], "unpaid");
    assert_eq!(data["order"]["tax_type"], "billing_address");
    assert_eq!(money(&data["payment"]["subtotal"]), dec!(200));
    assert_eq!(money(&data["payment"]["tax_amount"]), dec!(20));
    assert_eq!(money(&data["payment"]["shipping_cost"]), dec!(11));
    assert_eq!(money(&data["payment"]["total"]), dec!(231));

    let subs = data["sub_orders"].as_array().unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(money(&subs[0]["sub_order"]["total_amount"]), dec!(200));
    assert_eq!(money(&subs[0]["sub_order"]["shipping_cost"]), dec!(11));
    assert_eq!(subs[0]["items"].as_array().unwrap().len(), 1);
    assert_eq!(subs[0]["items"][0]["quantity"], 2);

    let tracks = data["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(data["address"]["city"], "Antwerp");

    let refreshed = app.state.services.products.get(product_id).await.unwrap();
    let inventory = refreshed.inventory.expect("tracked product");
    assert_eq!(inventory.stock, 3);
    assert_eq!(inventory.sold, 2);
}

#[tokio::test]
async fn cart_is_split_into_one_sub_order_per_vendor() {
    let app = TestApp::new().await;
    let vendor_a = Uuid::new_v4();
    let vendor_b = Uuid::new_v4();
    let platform = app.seed_product(dec!(50), dec!(0), None, None).await;
    let ring_a = app.seed_product(dec!(120), dec!(0), Some(vendor_a), None).await;
    let ring_b = app.seed_product(dec!(80), dec!(0), Some(vendor_b), None).await;

    let mut body = order_body(
        "split@example.com",
        vec![
            line(platform.product.id, 1, "50"),
            line(ring_a.product.id, 1, "120"),
            line(ring_b.product.id, 2, "80"),
        ],
    );
    body["shipping"] = json!({
        "admin": { "cost": "5" },
        "vendors": {
            vendor_a.to_string(): { "cost": "10" },
            vendor_b.to_string(): { "cost": "20" }
        }
    });

    let order_id = app.place_order(body).await;
    let detail = app.state.services.orders.get_order(order_id).await.unwrap();

    assert_eq!(detail.sub_orders.len(), 3);
    assert_eq!(detail.order.vendor_id, None);
    let by_vendor = |vendor: Option<Uuid>| {
        detail
            .sub_orders
            .iter()
            .find(|s| s.sub_order.vendor_id == vendor)
            .expect("sub-order for vendor")
    };
    assert_eq!(by_vendor(None).sub_order.total_amount, dec!(50));
    assert_eq!(by_vendor(None).sub_order.shipping_cost, dec!(5.5));
    assert_eq!(by_vendor(Some(vendor_a)).sub_order.total_amount, dec!(120));
    assert_eq!(by_vendor(Some(vendor_a)).sub_order.shipping_cost, dec!(11));
    assert_eq!(by_vendor(Some(vendor_b)).sub_order.total_amount, dec!(160));
    assert_eq!(by_vendor(Some(vendor_b)).items.len(), 1);

    let payment = detail.payment.expect("payment summary");
    assert_eq!(payment.subtotal, dec!(330));
    assert_eq!(payment.shipping_cost.round_dp(2), dec!(38.5));
    assert_eq!(payment.total.round_dp(2), dec!(368.5));
}

#[tokio::test]
async fn single_vendor_order_records_the_vendor_on_the_order() {
    let app = TestApp::new().await;
    let vendor = Uuid::new_v4();
    let product = app.seed_product(dec!(75), dec!(0), Some(vendor), None).await;

    let order_id = app
        .place_order(order_body(
            "solo@example.com",
            vec![line(product.product.id, 1, "75")],
        ))
        .await;
    let detail = app.state.services.orders.get_order(order_id).await.unwrap();
    assert_eq!(detail.order.vendor_id, Some(vendor));
}

#[tokio::test]
async fn stock_shortage_rolls_back_the_whole_order() {
    let app = TestApp::new().await;
    let plenty = app.seed_product(dec!(20), dec!(0), None, Some(10)).await;
    let scarce = app.seed_product(dec!(30), dec!(0), None, Some(1)).await;

    let body = order_body(
        "short@example.com",
        vec![
            line(plenty.product.id, 3, "20"),
            line(scarce.product.id, 2, "30"),
        ],
    );
    let (status, error) = app.send(Method::POST, "/api/order", Some(body), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["success"], false);
    assert_eq!(
        error["message"],
        format!("Insufficient stock for product {}", scarce.product.id)
    );

    let plenty_after = app.state.services.products.get(plenty.product.id).await.unwrap();
    assert_eq!(plenty_after.inventory.unwrap().stock, 10);

    let buyer = gemstore_api::services::users::find_by_email(
        app.state.db.as_ref(),
        "short@example.com",
    )
    .await
    .unwrap();
    assert!(buyer.is_none(), "guest buyer must not survive the rollback");
}

#[tokio::test]
async fn variant_lines_reserve_variant_stock_at_the_variant_price() {
    let app = TestApp::new().await;
    let pendant = app.seed_variant_product(dec!(300), dec!(450), 1).await;
    let variant_id = pendant.variants[0].variant.id;

    let cart_line = json!({
        "product_id": pendant.product.id,
        "quantity": 1,
        "price": "450",
        "options": {
            "kind": "gemstone",
            "variant_id": variant_id,
            "diamond_id": "GIA-2231",
            "selections": { "metal": "platinum" }
        }
    });
    let order_id = app
        .place_order(order_body("gem@example.com", vec![cart_line.clone()]))
        .await;

    let detail = app.state.services.orders.get_order(order_id).await.unwrap();
    let item = &detail.sub_orders[0].items[0];
    assert_eq!(item.variant_id, Some(variant_id));
    assert_eq!(item.diamond_id.as_deref(), Some("GIA-2231"));
    assert_eq!(item.price, dec!(450));

    let (status, error) = app
        .send(
            Method::POST,
            "/api/order",
            Some(order_body("gem2@example.com", vec![cart_line])),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{error}");
}

#[tokio::test]
async fn wallet_payment_debits_the_buyer_and_marks_the_order_paid() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(40), dec!(0), None, None).await;
    let buyer_id = app.fund_wallet("wallet@example.com", dec!(100)).await;

    let mut body = order_body("wallet@example.com", vec![line(product.product.id, 2, "40")]);
    body["payment_gateway"] = json!("wallet");
    let order_id = app.place_order(body).await;

    let detail = app.state.services.orders.get_order(order_id).await.unwrap();
    assert_eq!(detail.order.user_id, buyer_id);
    assert_eq!(
        detail.order.payment_status,
        gemstore_api::entities::PaymentStatus::Paid
    );

    let buyer = gemstore_api::services::users::find_by_email(
        app.state.db.as_ref(),
        "wallet@example.com",
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(buyer.wallet_balance, dec!(20));
}

#[tokio::test]
async fn wallet_shortfall_is_payment_required_and_leaves_stock_alone() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(500), dec!(0), None, Some(2)).await;
    app.fund_wallet("broke@example.com", dec!(100)).await;

    let mut body = order_body("broke@example.com", vec![line(product.product.id, 1, "500")]);
    body["payment_gateway"] = json!("wallet");
    let (status, error) = app.send(Method::POST, "/api/order", Some(body), None).await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(error["message"], "Insufficient wallet balance");
    let after = app.state.services.products.get(product.product.id).await.unwrap();
    assert_eq!(after.inventory.unwrap().stock, 2);
}

#[tokio::test]
async fn pos_orders_use_zone_tax_and_skip_shipping() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100), dec!(3), None, None).await;

    let mut body = order_body("counter@example.com", vec![line(product.product.id, 1, "100")]);
    body["type"] = json!("pos");
    body["shipping"] = json!({ "admin": { "cost": "25" } });
    let (status, created) = app.send(Method::POST, "/api/order", Some(body), None).await;

    assert_eq!(status, StatusCode::CREATED, "{created}");
    // default zone rate is 10%, product rate ignored, no shipping
    assert_eq!(money(&created["data"]["total_amount"]), dec!(110));

    let order_id: Uuid = created["data"]["order_id"].as_str().unwrap().parse().unwrap();
    let detail = app.state.services.orders.get_order(order_id).await.unwrap();
    assert_eq!(detail.order.tax_type, gemstore_api::entities::TaxMode::ZoneWiseTax);
    assert_eq!(detail.payment.unwrap().shipping_cost, dec!(0));
}

#[tokio::test]
async fn mismatched_client_price_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100), dec!(0), None, Some(3)).await;

    let body = order_body("cheap@example.com", vec![line(product.product.id, 1, "1.00")]);
    let (status, error) = app.send(Method::POST, "/api/order", Some(body), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error["message"],
        format!("Price mismatch for product {}", product.product.id)
    );
}

#[tokio::test]
async fn unknown_and_inactive_products_are_unavailable() {
    let app = TestApp::new().await;
    let missing = Uuid::new_v4();

    let (status, error) = app
        .send(
            Method::POST,
            "/api/order",
            Some(order_body("ghost@example.com", vec![line(missing, 1, "10")])),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], format!("Product {missing} is not available"));
}

#[tokio::test]
async fn malformed_orders_report_every_invalid_field() {
    let app = TestApp::new().await;

    let body = json!({
        "customer": { "name": "", "email": "not-an-email" },
        "shipping_address": {
            "name": "X", "address_line1": "1 Road", "city": "Oslo", "country": "NO"
        },
        "cart": []
    });
    let (status, error) = app.send(Method::POST, "/api/order", Some(body), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "Validation failed");
    let details: Vec<String> = serde_json::from_value(error["details"].clone()).unwrap();
    assert!(details.iter().any(|d| d.starts_with("cart")));
    assert!(details.iter().any(|d| d.starts_with("customer.email")));
    assert!(details.iter().any(|d| d.starts_with("customer.name")));
}

#[tokio::test]
async fn non_json_body_is_a_bad_request() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::POST, "/api/order", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_from_a_saved_session_consumes_it() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(60), dec!(0), None, None).await;

    let (status, session) = app
        .send(
            Method::POST,
            "/api/order/session",
            Some(json!({ "snapshot": { "cart": [{ "product_id": product.product.id, "quantity": 1 }] } })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{session}");
    let session_id = session["data"]["order_session_id"].as_str().unwrap().to_string();

    let mut body = order_body("session@example.com", vec![line(product.product.id, 1, "60")]);
    body["order_session_id"] = json!(session_id);
    let order_id = app.place_order(body.clone()).await;
    let detail = app.state.services.orders.get_order(order_id).await.unwrap();
    assert_eq!(
        detail.order.order_session_id.map(|id| id.to_string()),
        Some(session_id)
    );

    let (status, error) = app.send(Method::POST, "/api/order", Some(body), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "Order session already used");
}

#[tokio::test]
async fn unknown_order_session_is_rejected_and_nothing_is_kept() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(60), dec!(0), None, Some(2)).await;

    let mut body = order_body("ghost@example.com", vec![line(product.product.id, 1, "60")]);
    body["order_session_id"] = json!(Uuid::new_v4());
    let (status, error) = app.send(Method::POST, "/api/order", Some(body), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "Order session not found");
    let after = app.state.services.products.get(product.product.id).await.unwrap();
    assert_eq!(after.inventory.unwrap().stock, 2);
}

#[tokio::test]
async fn negative_shipping_quotes_are_rejected() {
    let app = TestApp::new().await;
    let vendor = Uuid::new_v4();
    let product = app.seed_product(dec!(100), dec!(0), Some(vendor), None).await;

    let mut body = order_body("cheeky@example.com", vec![line(product.product.id, 1, "100")]);
    body["shipping"] = json!({
        "admin": { "cost": "-500" },
        "vendors": { vendor.to_string(): { "cost": "-1" } }
    });
    let (status, error) = app.send(Method::POST, "/api/order", Some(body), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{error}");
    assert_eq!(error["message"], "Validation failed");
    let details: Vec<&str> = error["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d.as_str())
        .collect();
    assert!(details.contains(&"shipping.admin.cost: must_not_be_negative"), "{details:?}");
    assert!(
        details.contains(&format!("shipping.vendors[{vendor}].cost: must_not_be_negative").as_str()),
        "{details:?}"
    );
}

#[tokio::test]
async fn wallet_cannot_be_credited_through_a_negative_total() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(10), dec!(0), None, None).await;
    let buyer_id = app.fund_wallet("refund-me@example.com", dec!(1)).await;

    let mut body = order_body("refund-me@example.com", vec![line(product.product.id, 1, "10")]);
    body["payment_gateway"] = json!("wallet");
    body["shipping"] = json!({ "admin": { "cost": "-1000" } });
    let (status, _) = app.send(Method::POST, "/api/order", Some(body), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // the debit itself refuses negative amounts
    let err = gemstore_api::services::users::debit_wallet(
        app.state.db.as_ref(),
        buyer_id,
        dec!(-1000),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let buyer = gemstore_api::services::users::find_by_email(
        app.state.db.as_ref(),
        "refund-me@example.com",
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(buyer.wallet_balance, dec!(1));
}

#[tokio::test]
async fn oversized_shipping_quotes_are_bad_requests() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(100), dec!(0), None, None).await;

    let mut body = order_body("whale@example.com", vec![line(product.product.id, 1, "100")]);
    body["shipping"] = json!({ "admin": { "cost": "79228162514264337593543950335" } });
    let (status, error) = app.send(Method::POST, "/api/order", Some(body), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{error}");
    assert_eq!(error["success"], false);
    assert!(error["details"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d == "shipping.admin.cost: amount_too_large"));
}

#[tokio::test]
async fn quotes_for_vendors_outside_the_cart_are_not_charged() {
    let app = TestApp::new().await;
    let vendor = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let product = app.seed_product(dec!(100), dec!(0), Some(vendor), None).await;

    let mut body = order_body("focused@example.com", vec![line(product.product.id, 1, "100")]);
    body["shipping"] = json!({
        "vendors": {
            vendor.to_string(): { "cost": "10" },
            stranger.to_string(): { "cost": "90" }
        }
    });
    let order_id = app.place_order(body).await;

    let detail = app.state.services.orders.get_order(order_id).await.unwrap();
    let payment = detail.payment.unwrap();
    // 10 base plus the default 10% shipping tax
    assert_eq!(payment.shipping_cost, dec!(11));
    let per_sub_order: rust_decimal::Decimal = detail
        .sub_orders
        .iter()
        .map(|sub| sub.sub_order.shipping_cost)
        .sum();
    assert_eq!(per_sub_order, payment.shipping_cost);
    assert_eq!(payment.total, dec!(111));
}
