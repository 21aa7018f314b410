use actix_web::{http::StatusCode, test::TestRequest};
use pos_common::Money;
use pos_engine::{
    db_types::{CartItem, Order, OrderLog, OrderStatus, TableStatus},
    events::{ORDER_CREATE, ORDER_FINISH, ORDER_PAID},
    lock::keys,
    test_utils::fixtures::STORE_ID,
    ORDER_COMPLETE_LOG,
};
use serde_json::json;

use super::helpers::{as_cashier, TestServer};
use crate::data_objects::OrderDetail;

async fn open_order(server: &TestServer, table_id: Option<i64>, product_id: i64, quantity: i64) -> Order {
    let body = json!({
        "store_id": STORE_ID,
        "table_id": table_id,
        "items": [{"product_id": product_id, "quantity": quantity}],
    });
    let (status, body) = server.send(as_cashier(TestRequest::post().uri("/orders")).set_json(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    serde_json::from_str(&body).expect("Response was not an order")
}

fn post(uri: String, body: serde_json::Value) -> TestRequest {
    as_cashier(TestRequest::post().uri(&uri)).set_json(body)
}

#[actix_web::test]
async fn health() {
    let server = TestServer::new().await;
    let (status, body) = server.send(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn create_and_fetch_order() {
    let server = TestServer::new().await;
    let table_id = server.system.catalog.table(0);
    let order = open_order(&server, Some(table_id), server.system.catalog.coffee.id, 2).await;
    assert_eq!(order.status, OrderStatus::Unpaid);
    assert_eq!(order.real_price, Money::from(50));
    assert_eq!(order.creator_name, "Alice");

    let (status, body) = server.send(TestRequest::get().uri(&format!("/orders/{}", order.order_no))).await;
    assert_eq!(status, StatusCode::OK);
    let detail: OrderDetail = serde_json::from_str(&body).unwrap();
    assert_eq!(detail.order.order_no, order.order_no);
    assert_eq!(detail.order.items.len(), 1);
    assert!(detail.payments.is_empty());

    let table = server.system.engine.api().table(table_id).await.unwrap();
    assert_eq!(table.status, TableStatus::Occupied);
}

#[actix_web::test]
async fn requests_without_an_operator_are_rejected() {
    let server = TestServer::new().await;
    let body = json!({"store_id": STORE_ID, "items": [{"product_id": server.system.catalog.coffee.id, "quantity": 1}]});
    let (status, body) = server.send(TestRequest::post().uri("/orders").set_json(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("X-Operator-Type"), "{body}");
}

#[actix_web::test]
async fn errors_map_to_status_codes() {
    let server = TestServer::new().await;
    let (status, body) = server.send(TestRequest::get().uri("/orders/OD2024010100001")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("\"kind\":\"not_found\""), "{body}");

    let table_id = server.system.catalog.table(1);
    let coffee = server.system.catalog.coffee.id;
    open_order(&server, Some(table_id), coffee, 1).await;
    let body = json!({"store_id": STORE_ID, "table_id": table_id, "items": [{"product_id": coffee, "quantity": 1}]});
    let (status, body) = server.send(post("/orders".into(), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("already occupied"), "{body}");

    let order = open_order(&server, None, coffee, 1).await;
    let held = server.system.engine.locks().acquire(keys::order(&order.order_no)).await.unwrap();
    let uri = format!("/orders/{}/discount", order.order_no);
    let (status, _) = server.send(post(uri, json!({"amount": "5"}))).await;
    assert_eq!(status, StatusCode::LOCKED);
    held.release().await;
}

#[actix_web::test]
async fn oversized_and_overprecise_amounts_are_rejected() {
    let server = TestServer::new().await;
    let coffee = server.system.catalog.coffee.id;
    let huge = "79228162514264337593543950335";
    let body = json!({"store_id": STORE_ID, "items": [{"product_id": coffee, "quantity": huge}]});
    let (status, body) = server.send(post("/orders".into(), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Quantity must be positive"), "{body}");

    let order = open_order(&server, None, coffee, 1).await;
    let no = order.order_no;
    let (status, _) = server.send(post(format!("/orders/{no}/cash"), json!({"amount": "0.001"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server.send(post(format!("/orders/{no}/discount"), json!({"amount": "1.005"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = server.send(TestRequest::get().uri(&format!("/orders/{no}"))).await;
    let detail: OrderDetail = serde_json::from_str(&body).unwrap();
    assert_eq!(detail.order.paid, Money::ZERO);
    assert_eq!(detail.order.discount, Money::ZERO);
}

#[actix_web::test]
async fn cash_payments_settle_and_complete_the_order() {
    let server = TestServer::new().await;
    let order = open_order(&server, None, server.system.catalog.banquet.id, 2).await;
    let no = order.order_no.clone();
    assert_eq!(order.real_price, Money::from(10_000));

    let (status, body) = server.send(post(format!("/orders/{no}/cash"), json!({"amount": "5000"}))).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatus::PartPaid);

    let (status, body) = server.send(post(format!("/orders/{no}/cash"), json!({"amount": "6000"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, body) = server.send(post(format!("/orders/{no}/cash"), json!({"amount": "5000"}))).await;
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.cash_paid, Money::from(10_000));
    assert!(order.finished_at.is_some());

    let (status, body) = server.send(as_cashier(TestRequest::post().uri(&format!("/orders/{no}/complete")))).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatus::Finished);

    let (_, body) = server.send(TestRequest::get().uri(&format!("/orders/{no}/logs"))).await;
    let logs: Vec<OrderLog> = serde_json::from_str(&body).unwrap();
    let events = logs.iter().map(|l| l.event.as_str()).collect::<Vec<_>>();
    assert_eq!(events.first(), Some(&ORDER_CREATE));
    assert_eq!(events.last(), Some(&ORDER_COMPLETE_LOG));
    assert_eq!(events.iter().filter(|e| **e == ORDER_PAID).count(), 2);
    assert_eq!(events.iter().filter(|e| **e == ORDER_FINISH).count(), 1);
}

#[actix_web::test]
async fn order_changes() {
    let server = TestServer::new().await;
    let c = &server.system.catalog;
    let (a1, a2) = (c.table(0), c.table(1));
    let order = open_order(&server, Some(a1), c.coffee.id, 2).await;
    let no = order.order_no.clone();

    let items = json!({"items": [{"product_id": c.noodles.id, "quantity": 1}]});
    let (status, body) = server.send(post(format!("/orders/{no}/items"), items)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.total_price, Money::from(98));
    let noodles = order.items.iter().find(|i| i.product_id == c.noodles.id).unwrap().id;
    let coffee = order.items.iter().find(|i| i.product_id == c.coffee.id).unwrap().id;

    let removal = json!({"items": [{"item_id": noodles}]});
    let req = as_cashier(TestRequest::delete().uri(&format!("/orders/{no}/items"))).set_json(removal);
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.total_price, Money::from(50));

    let (_, body) = server.send(post(format!("/orders/{no}/price"), json!({"item_id": coffee, "price": "20"}))).await;
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.total_price, Money::from(40));

    let (_, body) = server.send(post(format!("/orders/{no}/discount"), json!({"amount": "4"}))).await;
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.real_price, Money::from(36));

    let (status, _) = server.send(post(format!("/orders/{no}/discount"), json!({"amount": "41"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = server.send(post(format!("/orders/{no}/turn_table"), json!({"table_id": a2}))).await;
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.table_id, Some(a2));
    assert_eq!(server.system.engine.api().table(a1).await.unwrap().status, TableStatus::Free);

    let (_, body) = server.send(post(format!("/orders/{no}/cancel"), json!({"reason": "walked out"}))).await;
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.cancel_reason.as_deref(), Some("walked out"));
    assert_eq!(server.system.engine.api().table(a2).await.unwrap().status, TableStatus::Free);

    let (status, _) = server.send(post(format!("/orders/{no}/discount"), json!({"amount": "1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn search_orders() {
    let server = TestServer::new().await;
    let c = &server.system.catalog;
    let paid = open_order(&server, None, c.coffee.id, 1).await;
    open_order(&server, None, c.noodles.id, 1).await;
    server.send(post(format!("/orders/{}/cash", paid.order_no), json!({"amount": "25"}))).await;

    let (status, body) = server.send(TestRequest::get().uri(&format!("/orders?store_id={STORE_ID}"))).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 2);

    let (_, body) = server.send(TestRequest::get().uri("/orders?status=Paid")).await;
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_no, paid.order_no);

    let (status, body) = server.send(TestRequest::get().uri("/exports/daily?status=Paid")).await;
    assert_eq!(status, StatusCode::OK);
    let exported: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].items.len(), 1);

    let held = server.system.engine.locks().acquire(keys::export("daily")).await.unwrap();
    let (status, _) = server.send(TestRequest::get().uri("/exports/daily")).await;
    assert_eq!(status, StatusCode::LOCKED);
    held.release().await;
}

#[actix_web::test]
async fn carts_check_out_into_orders() {
    let server = TestServer::new().await;
    let c = &server.system.catalog;
    let table_id = c.table(2);
    let uri = format!("/tables/{table_id}/cart");
    for (product_id, quantity) in [(c.coffee.id, 2), (c.noodles.id, 1)] {
        let item = json!({"product_id": product_id, "quantity": quantity});
        let (status, body) = server.send(TestRequest::post().uri(&uri).set_json(item)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }
    let (_, body) = server.send(TestRequest::get().uri(&uri)).await;
    let cart: Vec<CartItem> = serde_json::from_str(&body).unwrap();
    assert_eq!(cart.len(), 2);

    // Two noodles instead of one, and the coffee goes
    let noodles = cart.iter().find(|i| i.product_id == c.noodles.id).unwrap().id;
    let coffee = cart.iter().find(|i| i.product_id == c.coffee.id).unwrap().id;
    let req = TestRequest::put().uri(&format!("{uri}/{noodles}")).set_json(json!({"quantity": 2}));
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, _) = server.send(TestRequest::delete().uri(&format!("{uri}/{coffee}"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.send(TestRequest::delete().uri(&format!("{uri}/{coffee}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server.send(post(format!("/tables/{table_id}/checkout"), json!({"store_id": STORE_ID}))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.total_price, Money::from(96));
    assert_eq!(order.table_id, Some(table_id));

    let (_, body) = server.send(TestRequest::get().uri(&uri)).await;
    let cart: Vec<CartItem> = serde_json::from_str(&body).unwrap();
    assert!(cart.is_empty());

    let (status, _) = server.send(post(format!("/tables/{table_id}/checkout"), json!({"store_id": STORE_ID}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
