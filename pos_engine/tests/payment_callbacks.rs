use pos_common::Money;
use pos_engine::{
    db_types::{OrderNo, OrderStatus, Payment, PaymentChannel, PaymentState, ProviderKind, TableStatus},
    events::{ORDER_FINISH, ORDER_PAID},
    order_objects::{ItemRemoval, NewOrder, NewOrderItem, OnlinePayRequest, PaidParams},
    payment_objects::CallbackResult,
    providers::{ProviderError, MICROPAY_PATH},
    test_utils::fixtures::{cashier, huifu_notification, zhixinhua_notification, TestSystem, STORE_ID},
    ErrorKind,
    OrderFlowError,
    OrderRuleError,
    PaymentError,
};
use serde_json::json;

const WECHAT_CODE: &str = "134567890123456789";

async fn coffee_order(system: &TestSystem, quantity: i64, table_id: Option<i64>) -> OrderNo {
    let request = NewOrder::new(STORE_ID, table_id).with_item(NewOrderItem::new(system.catalog.coffee.id, quantity));
    system.engine.api().create_order(&cashier(), request).await.expect("Error creating order").order_no
}

fn applied(result: CallbackResult) -> Payment {
    match result {
        CallbackResult::Applied(payment) => payment,
        other => panic!("Expected the callback to apply, got {other:?}"),
    }
}

fn barcode(amount: i64) -> OnlinePayRequest {
    OnlinePayRequest {
        provider: ProviderKind::Huifu,
        amount: Money::from(amount),
        auth_code: Some(WECHAT_CODE.to_string()),
        member_token: None,
        description: None,
    }
}

fn member(provider: ProviderKind, amount: i64) -> OnlinePayRequest {
    OnlinePayRequest {
        provider,
        amount: Money::from(amount),
        auth_code: None,
        member_token: Some("member-501".to_string()),
        description: Some("Lunch".to_string()),
    }
}

#[tokio::test]
async fn online_payment_settles_order_exactly_once() {
    let system = TestSystem::new().await;
    let api = system.engine.api();
    let payments = system.engine.payments();
    let table_id = system.catalog.table(0);
    let no = coffee_order(&system, 2, Some(table_id)).await;

    let payment = api.pay_online(&cashier(), &no, barcode(50)).await.unwrap();
    assert_eq!(payment.state, PaymentState::Processing);
    assert_eq!(payment.channel, PaymentChannel::WeChat);
    assert_eq!(payment.business_id, no.as_str());
    assert!(payment.finished_at.is_none());
    assert!(payment.seq_no.starts_with("PY"));
    let requests = system.transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, MICROPAY_PATH);
    assert_eq!(requests[0].1["trans_amt"], json!("50.00"));

    // Nothing about the order changes until the provider confirms
    let order = api.order(&no).await.unwrap();
    assert_eq!(order.status, OrderStatus::Unpaid);
    let err = api.append_items(&cashier(), &no, vec![NewOrderItem::new(system.catalog.noodles.id, 1)]).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Rule(OrderRuleError::PaymentInFlight(_))));
    let err = api.cash_paid(&cashier(), &no, Money::from(50)).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Rule(OrderRuleError::PaymentInFlight(_))));
    let err = api.pay_online(&cashier(), &no, barcode(50)).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Rule(OrderRuleError::PaymentInFlight(_))));

    let payload = huifu_notification(&payment.seq_no, payment.amount, "S");
    let job = payments.receive_callback(ProviderKind::Huifu, &payload).await.unwrap();
    assert_eq!(job.seq_no, payment.seq_no);
    let result = payments.process_payment_callback(&job).await.unwrap();
    let settled = applied(result);
    assert_eq!(settled.state, PaymentState::Success);
    assert!(settled.finished_at.is_some());
    assert_eq!(settled.callback_payload.as_deref(), Some(payload.as_str()));
    // The gateway's answer to the request is kept untouched for audit
    assert!(payment.response.is_some());
    assert_eq!(settled.response, payment.response);
    assert!(settled.response.as_deref().unwrap_or_default().contains("T_MICROPAY"));
    assert_eq!(settled.request, payment.request);

    let order = api.order(&no).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.online_paid, Money::from(50));
    assert_eq!(order.paid_channels.0[0].seq_no.as_deref(), Some(payment.seq_no.as_str()));
    assert!(order.finished_at.is_some());

    // The same job delivered twice
    let again = payments.process_payment_callback(&job).await.unwrap();
    assert!(matches!(again, CallbackResult::AlreadyHandled));
    // The provider notifying twice
    let duplicate = payments.receive_callback(ProviderKind::Huifu, &payload).await.unwrap();
    let again = payments.process_payment_callback(&duplicate).await.unwrap();
    assert!(matches!(again, CallbackResult::AlreadyFinished(_)));

    let order = api.order(&no).await.unwrap();
    assert_eq!(order.paid, Money::from(50));
    let logs = api.order_logs(&no).await.unwrap();
    assert_eq!(logs.iter().filter(|l| l.event == ORDER_PAID).count(), 1);
    assert_eq!(logs.iter().filter(|l| l.event == ORDER_FINISH).count(), 1);
    let finance = api.finance_logs(&no).await.unwrap();
    assert_eq!(finance.len(), 1);
    assert_eq!(finance[0].channel, PaymentChannel::WeChat);
    assert_eq!(finance[0].seq_no.as_deref(), Some(payment.seq_no.as_str()));
}

#[tokio::test]
async fn points_and_cash_split_the_bill() {
    let system = TestSystem::new().await;
    let api = system.engine.api();
    let payments = system.engine.payments();
    let no = coffee_order(&system, 2, None).await;

    let payment = api.pay_online(&cashier(), &no, member(ProviderKind::ZhiXinHuaPoints, 20)).await.unwrap();
    assert_eq!(payment.channel, PaymentChannel::Points);
    let payload = zhixinhua_notification(&payment.seq_no, payment.amount, "SUCCESS");
    let job = payments.receive_callback(ProviderKind::ZhiXinHuaPoints, &payload).await.unwrap();
    let result = payments.process_payment_callback(&job).await.unwrap();
    let settled = applied(result);
    assert!(settled.member_info.unwrap().contains("gold"));

    let order = api.order(&no).await.unwrap();
    assert_eq!(order.status, OrderStatus::PartPaid);
    assert_eq!(order.point_paid, Money::from(20));

    let order = api.cash_paid(&cashier(), &no, Money::from(30)).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.paid, Money::from(50));
    assert_eq!(order.paid_channels.0.len(), 2);
    assert_eq!(api.payments_for_order(&no).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_payment_lifts_the_guard() {
    let system = TestSystem::new().await;
    let api = system.engine.api();
    let payments = system.engine.payments();
    let no = coffee_order(&system, 1, None).await;

    let payment = api.pay_online(&cashier(), &no, barcode(25)).await.unwrap();
    let pending = huifu_notification(&payment.seq_no, payment.amount, "P");
    let job = payments.receive_callback(ProviderKind::Huifu, &pending).await.unwrap();
    let result = payments.process_payment_callback(&job).await.unwrap();
    let waiting = applied(result);
    assert_eq!(waiting.state, PaymentState::Waiting);
    assert!(waiting.finished_at.is_none());

    let failed = huifu_notification(&payment.seq_no, payment.amount, "F");
    let job = payments.receive_callback(ProviderKind::Huifu, &failed).await.unwrap();
    let result = payments.process_payment_callback(&job).await.unwrap();
    let failed = applied(result);
    assert_eq!(failed.state, PaymentState::Failure);
    assert_eq!(failed.fail_reason.as_deref(), Some("declined"));

    let order = api.order(&no).await.unwrap();
    assert_eq!(order.status, OrderStatus::Unpaid);
    assert!(order.paid.is_zero());
    assert!(api.finance_logs(&no).await.unwrap().is_empty());
    let order = api.append_items(&cashier(), &no, vec![NewOrderItem::new(system.catalog.noodles.id, 1)]).await.unwrap();
    assert_eq!(order.total_price, Money::from(73));
}

#[tokio::test]
async fn rejected_payments_are_not_stored() {
    let system = TestSystem::new().await;
    let api = system.engine.api();
    let no = coffee_order(&system, 1, None).await;

    system.transport.push_response(MICROPAY_PATH, Ok(json!({"resp_code": "90000000", "resp_desc": "code expired"})));
    let err = api.pay_online(&cashier(), &no, barcode(25)).await.unwrap_err();
    let OrderFlowError::Payment(e) = &err else { panic!("Expected a payment error, got {err:?}") };
    assert!(matches!(**e, PaymentError::Provider(ProviderError::Rejected { .. })));
    assert_eq!(err.kind(), ErrorKind::Business);
    assert!(api.payments_for_order(&no).await.unwrap().is_empty());

    let mut no_code = barcode(25);
    no_code.auth_code = None;
    let err = api.pay_online(&cashier(), &no, no_code).await.unwrap_err();
    assert!(err.to_string().contains("payment code"), "{err}");

    // Amount checks happen before the provider is contacted
    let before = system.transport.requests().len();
    let err = api.pay_online(&cashier(), &no, barcode(26)).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Rule(OrderRuleError::Overpayment { .. })));
    assert_eq!(system.transport.requests().len(), before);

    let payment = api.pay_online(&cashier(), &no, barcode(25)).await.unwrap();
    assert_eq!(payment.state, PaymentState::Processing);
}

#[tokio::test]
async fn closed_payments_ignore_late_callbacks() {
    let system = TestSystem::new().await;
    let api = system.engine.api();
    let payments = system.engine.payments();
    let no = coffee_order(&system, 1, None).await;

    let payment = api.pay_online(&cashier(), &no, member(ProviderKind::ZhiXinHuaWallet, 25)).await.unwrap();
    assert_eq!(payment.channel, PaymentChannel::Wallet);
    let closed = api.close_payment(&cashier(), &payment.seq_no, "customer walked away").await.unwrap();
    assert_eq!(closed.state, PaymentState::Failure);
    assert!(closed.finished_at.is_some());
    let err = api.close_payment(&cashier(), &payment.seq_no, "twice").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let late = zhixinhua_notification(&payment.seq_no, payment.amount, "SUCCESS");
    let job = payments.receive_callback(ProviderKind::ZhiXinHuaWallet, &late).await.unwrap();
    let result = payments.process_payment_callback(&job).await.unwrap();
    assert!(matches!(result, CallbackResult::AlreadyFinished(_)));
    assert_eq!(api.order(&no).await.unwrap().status, OrderStatus::Unpaid);
}

#[tokio::test]
async fn callbacks_for_unknown_payments() {
    let system = TestSystem::new().await;
    let payments = system.engine.payments();

    // Huifu notifications for payments we never made are dropped
    let payload = huifu_notification("PY2024010199999", Money::from(10), "S");
    let job = payments.receive_callback(ProviderKind::Huifu, &payload).await.unwrap();
    assert!(matches!(payments.process_payment_callback(&job).await.unwrap(), CallbackResult::PaymentMissing));
    assert!(matches!(payments.process_payment_callback(&job).await.unwrap(), CallbackResult::AlreadyHandled));

    // The wallet may notify before the payment is visible, so the callback is kept for another attempt
    let payload = zhixinhua_notification("PY2024010199998", Money::from(10), "SUCCESS");
    let job = payments.receive_callback(ProviderKind::ZhiXinHuaWallet, &payload).await.unwrap();
    let err = payments.process_payment_callback(&job).await.unwrap_err();
    assert!(matches!(err, PaymentError::PaymentNotFound(_)));
    let err = payments.process_payment_callback(&job).await.unwrap_err();
    assert!(matches!(err, PaymentError::PaymentNotFound(_)));

    let err = payments.receive_callback(ProviderKind::Huifu, "not json").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Business);
}

#[tokio::test]
async fn mismatched_callbacks_are_kept_for_retry() {
    let system = TestSystem::new().await;
    let api = system.engine.api();
    let payments = system.engine.payments();
    let no = coffee_order(&system, 1, None).await;
    let payment = api.pay_online(&cashier(), &no, barcode(25)).await.unwrap();

    let wrong_amount = huifu_notification(&payment.seq_no, Money::from(24), "S");
    let job = payments.receive_callback(ProviderKind::Huifu, &wrong_amount).await.unwrap();
    for _ in 0..2 {
        let err = payments.process_payment_callback(&job).await.unwrap_err();
        assert!(matches!(err, PaymentError::Provider(ProviderError::CallbackMismatch { .. })), "{err}");
    }
    let stored = api.payments_for_order(&no).await.unwrap();
    assert_eq!(stored[0].state, PaymentState::Processing);
    assert_eq!(api.order(&no).await.unwrap().status, OrderStatus::Unpaid);
    assert_eq!(payments.pending_jobs().await.unwrap(), vec![job]);
}

#[tokio::test]
async fn consumed_callbacks_are_not_pending() {
    let system = TestSystem::new().await;
    let api = system.engine.api();
    let payments = system.engine.payments();
    let no = coffee_order(&system, 1, None).await;
    let payment = api.pay_online(&cashier(), &no, barcode(25)).await.unwrap();

    let pending = huifu_notification(&payment.seq_no, Money::from(25), "P");
    let success = huifu_notification(&payment.seq_no, Money::from(25), "S");
    let early = payments.receive_callback(ProviderKind::Huifu, &pending).await.unwrap();
    let late = payments.receive_callback(ProviderKind::Huifu, &success).await.unwrap();
    assert_eq!(payments.pending_jobs().await.unwrap(), vec![early.clone(), late.clone()]);

    payments.process_payment_callback(&early).await.unwrap();
    assert_eq!(payments.pending_jobs().await.unwrap(), vec![late]);
}

#[tokio::test]
async fn in_flight_payments_freeze_the_order() {
    let system = TestSystem::new().await;
    let api = system.engine.api();
    let (seated, spare) = (system.catalog.table(0), system.catalog.table(1));
    let no = coffee_order(&system, 2, Some(seated)).await;
    api.pay_online(&cashier(), &no, barcode(20)).await.unwrap();
    let before = api.order(&no).await.unwrap();
    let item_id = before.items[0].id;

    let attempts = [
        api.remove_items(&cashier(), &no, vec![ItemRemoval::whole(item_id)]).await,
        api.remove_items(&cashier(), &no, vec![ItemRemoval::partial(item_id, 1)]).await,
        api.change_item_price(&cashier(), &no, item_id, Money::from(1)).await,
        api.discount(&cashier(), &no, Money::from(5)).await,
        api.turn_table(&cashier(), &no, spare).await,
        api.cancel(&cashier(), &no, "changed their mind").await,
    ];
    for attempt in attempts {
        let err = attempt.unwrap_err();
        assert!(matches!(err, OrderFlowError::Rule(OrderRuleError::PaymentInFlight(_))), "{err}");
        assert_eq!(err.kind(), ErrorKind::Business);
    }

    let after = api.order(&no).await.unwrap();
    assert_eq!(after.status, OrderStatus::Unpaid);
    assert_eq!(after.total_price, before.total_price);
    assert_eq!(after.discount, before.discount);
    assert_eq!(after.real_price, before.real_price);
    assert_eq!(after.table_id, Some(seated));
    assert_eq!(after.items.len(), 1);
    assert_eq!(after.items[0].quantity, before.items[0].quantity);
    assert_eq!(after.items[0].unit_price, before.items[0].unit_price);
    assert!(after.cancelled_at.is_none());
    assert_eq!(api.table(seated).await.unwrap().status, TableStatus::Occupied);
    assert_eq!(api.table(spare).await.unwrap().status, TableStatus::Free);
}

#[tokio::test]
#[should_panic(expected = "requires a transaction")]
async fn paid_outside_a_transaction_panics() {
    let system = TestSystem::new().await;
    let no = coffee_order(&system, 1, None).await;
    let mut session = system.db().session().await.unwrap();
    let params = PaidParams::cash(no, Money::from(25), cashier());
    let _ = system.engine.orders().paid(&mut session, params).await;
}
