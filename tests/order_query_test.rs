mod common;

use axum::http::{Method, StatusCode};
use common::{line, money, order_body, TestApp, ORDER_CANCEL, ORDER_READ};
use rust_decimal_macros::dec;
use serde_json::Value;
use uuid::Uuid;

fn encode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

fn ids(body: &Value) -> Vec<String> {
    body["data"]["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|o| o["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn buyer_history_lists_only_that_buyers_orders() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(10), dec!(0), None, None).await;

    let mine_a = app
        .place_order(order_body("me@example.com", vec![line(product.product.id, 1, "10")]))
        .await;
    let mine_b = app
        .place_order(order_body("me@example.com", vec![line(product.product.id, 2, "10")]))
        .await;
    app.place_order(order_body("you@example.com", vec![line(product.product.id, 1, "10")]))
        .await;

    let detail = app.state.services.orders.get_order(mine_a).await.unwrap();
    let user_id = detail.order.user_id;

    let (status, body) = app
        .send(Method::GET, &format!("/api/order?user_id={user_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["total"], 2);
    let listed = ids(&body);
    // newest first
    assert_eq!(listed, vec![mine_b.to_string(), mine_a.to_string()]);
    assert_eq!(money(&body["data"]["items"][0]["total_amount"]), dec!(20));
}

#[tokio::test]
async fn buyer_history_paginates() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(5), dec!(0), None, None).await;
    let mut placed = Vec::new();
    for _ in 0..3 {
        placed.push(
            app.place_order(order_body("pager@example.com", vec![line(product.product.id, 1, "5")]))
                .await,
        );
    }
    let user_id = app
        .state
        .services
        .orders
        .get_order(placed[0])
        .await
        .unwrap()
        .order
        .user_id;

    let (_, page2) = app
        .send(
            Method::GET,
            &format!("/api/order?user_id={user_id}&page=2&limit=2"),
            None,
            None,
        )
        .await;
    assert_eq!(page2["data"]["total"], 3);
    assert_eq!(page2["data"]["total_pages"], 2);
    assert_eq!(page2["data"]["page"], 2);
    assert_eq!(ids(&page2), vec![placed[0].to_string()]);
}

#[tokio::test]
async fn buyer_history_requires_a_valid_user_id() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/order", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "user_id is required");

    let (status, body) = app
        .send(Method::GET, "/api/order?user_id=abc", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid user ID format");
}

#[tokio::test]
async fn admin_listing_requires_read_permission() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::GET, "/api/order?admin=true", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let canceller = app.token_with(&[ORDER_CANCEL]).await;
    let (status, _) = app
        .send(Method::GET, "/api/order?admin=true", None, Some(&canceller))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let reader = app.token_with(&[ORDER_READ]).await;
    let (status, body) = app
        .send(Method::GET, "/api/order?admin=true", None, Some(&reader))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn admin_listing_filters_by_status_and_vendor() {
    let app = TestApp::new().await;
    let vendor = Uuid::new_v4();
    let house = app.seed_product(dec!(10), dec!(0), None, None).await;
    let atelier = app.seed_product(dec!(10), dec!(0), Some(vendor), None).await;

    let house_order = app
        .place_order(order_body("h@example.com", vec![line(house.product.id, 1, "10")]))
        .await;
    let vendor_order = app
        .place_order(order_body("v@example.com", vec![line(atelier.product.id, 1, "10")]))
        .await;
    app.send(
        Method::PUT,
        &format!("/api/order/{house_order}"),
        None,
        Some(app.admin_token()),
    )
    .await;

    let filters = encode(r#"{"status":"canceled"}"#);
    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/order?admin=true&filters={filters}"),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ids(&body), vec![house_order.to_string()]);

    let filters = encode(&format!(r#"{{"vendor_id":"{vendor}"}}"#));
    let (_, body) = app
        .send(
            Method::GET,
            &format!("/api/order?admin=true&filters={filters}"),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(ids(&body), vec![vendor_order.to_string()]);
}

#[tokio::test]
async fn admin_listing_sorts_by_order_number() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(10), dec!(0), None, None).await;
    for email in ["a@example.com", "b@example.com", "c@example.com"] {
        app.place_order(order_body(email, vec![line(product.product.id, 1, "10")]))
            .await;
    }

    let sort = encode(r#"{"order_number":"asc"}"#);
    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/order?admin=true&sort={sort}"),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let numbers: Vec<String> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["order_number"].as_str().unwrap().to_string())
        .collect();
    let mut sorted = numbers.clone();
    sorted.sort();
    assert_eq!(numbers.len(), 3);
    assert_eq!(numbers, sorted);
}

#[tokio::test]
async fn malformed_admin_query_parameters_are_bad_requests() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/order?admin=true&filters={}", encode("{not json")),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid filters parameter"));

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/order?admin=true&filters={}", encode(r#"{"colour":"red"}"#)),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/order?admin=true&sort={}", encode(r#"{"total":"asc"}"#)),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot sort by total");
}
