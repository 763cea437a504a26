//! Order API tests: auth requirements, direct checkout, cart merge at login,
//! and the two-buyers-one-unit race over HTTP.

use axum::http::StatusCode;
use serde_json::json;

use spindle_integration_tests::{TestApp, billing_json, seed_album};

fn check_order_body() -> serde_json::Value {
    json!({
        "payment_method": "check",
        "payment_info": { "check_number": "1042" },
        "billing_info": billing_json(),
    })
}

#[tokio::test]
async fn orders_require_authentication() {
    let (app, _pool) = TestApp::spawn().await;
    let mut client = app.client();

    let (status, _) = client.get("/orders").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = client.post("/orders", check_order_body()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Unauthorized access");
}

#[tokio::test]
async fn login_merges_anonymous_cart_into_user_cart() {
    let (app, pool) = TestApp::spawn().await;
    let a = seed_album(&pool, "Speak No Evil", "Wayne Shorter", 1000, 10).await;
    let b = seed_album(&pool, "Maiden Voyage", "Herbie Hancock", 800, 10).await;

    // Build the user's existing cart in an earlier authenticated session.
    let mut earlier = app.client();
    earlier.login(42).await;
    earlier
        .post("/cart/items", json!({ "album_id": a.as_i64(), "quantity": 1 }))
        .await;

    // A fresh anonymous session collects {A:2, B:1}, then logs in.
    let mut client = app.client();
    client
        .post("/cart/items", json!({ "album_id": a.as_i64(), "quantity": 2 }))
        .await;
    client
        .post("/cart/items", json!({ "album_id": b.as_i64(), "quantity": 1 }))
        .await;
    client.login(42).await;

    let (_, body) = client.get("/cart").await;
    assert_eq!(body["data"]["item_count"], 2);
    let items = body["data"]["items"].as_array().expect("items");
    let quantity_of = |album_id: i64| {
        items
            .iter()
            .find(|item| item["album_id"] == album_id)
            .map(|item| item["quantity"].as_i64().expect("quantity"))
    };
    assert_eq!(quantity_of(a.as_i64()), Some(3));
    assert_eq!(quantity_of(b.as_i64()), Some(1));
}

#[tokio::test]
async fn checkout_creates_an_order_and_empties_the_cart() {
    let (app, pool) = TestApp::spawn().await;
    let a = seed_album(&pool, "Cool Struttin'", "Sonny Clark", 1000, 5).await;
    let b = seed_album(&pool, "Blue Trane", "John Coltrane", 500, 5).await;

    let mut client = app.client();
    client.login(7).await;
    client
        .post("/cart/items", json!({ "album_id": a.as_i64(), "quantity": 2 }))
        .await;
    client
        .post("/cart/items", json!({ "album_id": b.as_i64(), "quantity": 1 }))
        .await;

    let (status, body) = client.post("/orders", check_order_body()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Order created successfully");
    assert_eq!(body["data"]["total"], "25.00");
    assert_eq!(body["data"]["status"], "pending");
    assert!(
        body["data"]["order_number"]
            .as_str()
            .expect("order number")
            .starts_with("ORD-")
    );
    // Sanitized payment metadata only.
    assert_eq!(body["data"]["payment"]["method"], "check");

    let (_, cart) = client.get("/cart").await;
    assert_eq!(cart["data"]["item_count"], 0);
}

#[tokio::test]
async fn order_reads_are_scoped_to_their_owner() {
    let (app, pool) = TestApp::spawn().await;
    let a = seed_album(&pool, "Go!", "Dexter Gordon", 1200, 5).await;

    let mut buyer = app.client();
    buyer.login(1).await;
    buyer
        .post("/cart/items", json!({ "album_id": a.as_i64(), "quantity": 1 }))
        .await;
    let (_, body) = buyer.post("/orders", check_order_body()).await;
    let order_id = body["data"]["id"].as_i64().expect("order id");

    let (_, list) = buyer.get("/orders").await;
    assert_eq!(list["data"].as_array().expect("orders").len(), 1);

    let (status, shown) = buyer.get(&format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shown["data"]["id"], order_id);

    // Another user gets Forbidden, not the order.
    let mut other = app.client();
    other.login(2).await;
    let (status, body) = other.get(&format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (_, list) = other.get("/orders").await;
    assert_eq!(list["data"].as_array().expect("orders").len(), 0);
}

#[tokio::test]
async fn invalid_billing_and_payment_collect_field_errors() {
    let (app, pool) = TestApp::spawn().await;
    let a = seed_album(&pool, "Newk's Time", "Sonny Rollins", 1000, 5).await;

    let mut client = app.client();
    client.login(3).await;
    client
        .post("/cart/items", json!({ "album_id": a.as_i64(), "quantity": 1 }))
        .await;

    let (status, body) = client
        .post(
            "/orders",
            json!({
                "payment_method": "credit_card",
                "payment_info": { "card_type": "visa", "card_number": "1234" },
                "billing_info": { "address": "Abbey Road 3", "city": "London",
                                   "zip_code": "123", "phone": "03-1234567" },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation error");

    let fields: Vec<&str> = body["errors"]
        .as_array()
        .expect("errors")
        .iter()
        .map(|e| e["field"].as_str().expect("field"))
        .collect();
    assert!(fields.contains(&"zip_code"));
    assert!(fields.contains(&"card_number"));

    // Nothing was ordered and the cart is intact.
    let (_, cart) = client.get("/cart").await;
    assert_eq!(cart["data"]["item_count"], 1);
}

#[tokio::test]
async fn empty_cart_checkout_is_rejected() {
    let (app, _pool) = TestApp::spawn().await;
    let mut client = app.client();
    client.login(4).await;

    let (status, body) = client.post("/orders", check_order_body()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cart is empty");
}

#[tokio::test]
async fn ordering_past_stock_is_a_conflict() {
    let (app, pool) = TestApp::spawn().await;
    let a = seed_album(&pool, "Search for the New Land", "Lee Morgan", 1500, 1).await;

    let mut client = app.client();
    client.login(5).await;
    client
        .post("/cart/items", json!({ "album_id": a.as_i64(), "quantity": 3 }))
        .await;

    let (status, body) = client.post("/orders", check_order_body()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        format!("Album {} is out of stock", a.as_i64())
    );
}

#[tokio::test]
async fn two_buyers_racing_for_the_last_unit() {
    let (app, pool) = TestApp::spawn().await;
    let x = seed_album(&pool, "Getz/Gilberto", "Stan Getz", 2000, 1).await;

    let mut alice = app.client();
    alice.login(10).await;
    alice
        .post("/cart/items", json!({ "album_id": x.as_i64(), "quantity": 1 }))
        .await;

    let mut bob = app.client();
    bob.login(11).await;
    bob.post("/cart/items", json!({ "album_id": x.as_i64(), "quantity": 1 }))
        .await;

    let ((alice_status, _), (bob_status, bob_body)) = tokio::join!(
        alice.post("/orders", check_order_body()),
        bob.post("/orders", check_order_body())
    );

    let statuses = [alice_status, bob_status];
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::CREATED)
            .count(),
        1,
        "exactly one buyer gets the record"
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::CONFLICT)
            .count(),
        1,
        "the other is told it is out of stock"
    );
    if bob_status == StatusCode::CONFLICT {
        assert_eq!(
            bob_body["message"],
            format!("Album {} is out of stock", x.as_i64())
        );
    }

    let (stock,): (i64,) = sqlx::query_as("SELECT stock FROM albums WHERE id = ?1")
        .bind(x.as_i64())
        .fetch_one(&pool)
        .await
        .expect("stock query");
    assert_eq!(stock, 0);
}
