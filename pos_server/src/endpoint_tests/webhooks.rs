use actix_web::{http::StatusCode, test::TestRequest};
use pos_common::Money;
use pos_engine::{
    db_types::{Order, OrderNo, OrderStatus, Payment, PaymentState},
    test_utils::fixtures::{huifu_notification, zhixinhua_notification, STORE_ID},
};
use serde_json::json;

use super::helpers::{as_cashier, signed_webhook, TestServer};
use crate::{data_objects::OrderDetail, middleware::WEBHOOK_SIGNATURE_HEADER};

const WECHAT_CODE: &str = "134567890123456789";

async fn coffee_order(server: &TestServer) -> OrderNo {
    let body = json!({"store_id": STORE_ID, "items": [{"product_id": server.system.catalog.coffee.id, "quantity": 1}]});
    let (status, body) = server.send(as_cashier(TestRequest::post().uri("/orders")).set_json(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    serde_json::from_str::<Order>(&body).expect("Response was not an order").order_no
}

async fn start_payment(server: &TestServer, order_no: &OrderNo, body: serde_json::Value) -> Payment {
    let req = as_cashier(TestRequest::post().uri(&format!("/orders/{order_no}/pay"))).set_json(body);
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    serde_json::from_str(&body).expect("Response was not a payment")
}

fn wechat(amount: &str) -> serde_json::Value {
    json!({"provider": "Huifu", "amount": amount, "auth_code": WECHAT_CODE})
}

#[actix_web::test]
async fn signed_webhooks_settle_the_order() {
    let server = TestServer::new().await;
    let no = coffee_order(&server).await;
    let payment = start_payment(&server, &no, wechat("25")).await;
    assert_eq!(payment.state, PaymentState::Processing);

    let payload = huifu_notification(&payment.seq_no, Money::from(25), "S");
    let (status, body) = server.send(signed_webhook("huifu", &payload)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(server.wait_for_status(&no, OrderStatus::Paid).await);

    // A redelivered notification changes nothing
    let (status, _) = server.send(signed_webhook("huifu", &payload)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server.send(TestRequest::get().uri(&format!("/orders/{no}"))).await;
    let detail: OrderDetail = serde_json::from_str(&body).unwrap();
    assert_eq!(detail.order.paid, Money::from(25));
    assert_eq!(detail.order.online_paid, Money::from(25));
    assert_eq!(detail.payments.len(), 1);
    assert_eq!(detail.payments[0].state, PaymentState::Success);
    assert!(detail.payments[0].finished_at.is_some());
}

#[actix_web::test]
async fn wallet_webhooks() {
    let server = TestServer::new().await;
    let no = coffee_order(&server).await;
    let body = json!({"provider": "ZhiXinHuaWallet", "amount": "25", "member_token": "member-501"});
    let payment = start_payment(&server, &no, body).await;
    let payload = zhixinhua_notification(&payment.seq_no, Money::from(25), "SUCCESS");
    let (status, body) = server.send(signed_webhook("zxh_wallet", &payload)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(server.wait_for_status(&no, OrderStatus::Paid).await);
}

#[actix_web::test]
async fn unsigned_webhooks_are_refused() {
    let server = TestServer::new().await;
    let no = coffee_order(&server).await;
    let payment = start_payment(&server, &no, wechat("25")).await;
    let payload = huifu_notification(&payment.seq_no, Money::from(25), "S");

    let unsigned = TestRequest::post().uri("/webhook/payments/huifu").set_payload(payload.clone());
    let (status, _) = server.send(unsigned).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let forged = TestRequest::post()
        .uri("/webhook/payments/huifu")
        .insert_header((WEBHOOK_SIGNATURE_HEADER, "c2lnbmVkIGJ5IHNvbWVvbmUgZWxzZQ=="))
        .set_payload(payload.clone());
    let (status, _) = server.send(forged).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Signed for a different body
    let tampered = signed_webhook("huifu", &payload).set_payload(payload.replace("\"S\"", "\"F\""));
    let (status, _) = server.send(tampered).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert!(server.system.engine.payments().pending_jobs().await.unwrap().is_empty());
    let order = server.system.engine.api().order(&no).await.unwrap();
    assert_eq!(order.status, OrderStatus::Unpaid);
}

#[actix_web::test]
async fn malformed_webhooks_are_bad_requests() {
    let server = TestServer::new().await;
    let (status, _) = server.send(signed_webhook("paypal", "{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = server.send(signed_webhook("huifu", "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[actix_web::test]
async fn in_flight_payments_block_cash_until_closed() {
    let server = TestServer::new().await;
    let no = coffee_order(&server).await;
    let payment = start_payment(&server, &no, wechat("25")).await;

    let cash = json!({"amount": "25"});
    let req = as_cashier(TestRequest::post().uri(&format!("/orders/{no}/cash"))).set_json(cash.clone());
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("payment in progress"), "{body}");

    let close = json!({"reason": "customer left the terminal"});
    let req = as_cashier(TestRequest::post().uri(&format!("/payments/{}/close", payment.seq_no))).set_json(close);
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let closed: Payment = serde_json::from_str(&body).unwrap();
    assert_eq!(closed.state, PaymentState::Failure);

    let req = as_cashier(TestRequest::post().uri(&format!("/orders/{no}/cash"))).set_json(cash);
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    // The late success notification is discarded
    let payload = huifu_notification(&payment.seq_no, Money::from(25), "S");
    let (status, _) = server.send(signed_webhook("huifu", &payload)).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let order = server.system.engine.api().order(&no).await.unwrap();
    assert_eq!(order.paid, Money::from(25));
    assert_eq!(order.cash_paid, Money::from(25));
}
