use cucumber::{then, when};
use pos_common::Money;
use pos_engine::{
    db_types::{OrderStatus, PaymentState, ProviderKind, TableStatus},
    order_objects::{NewOrder, NewOrderItem, OnlinePayRequest},
    payment_objects::CallbackResult,
    test_utils::fixtures::{cashier, huifu_notification, STORE_ID},
};

use crate::cucumber::PosWorld;

#[when(expr = "I open order {string} at table {int} with {int} x {word}")]
async fn open_order(world: &mut PosWorld, name: String, table: usize, quantity: i64, product: String) {
    let request =
        NewOrder::new(STORE_ID, Some(world.table_id(table))).with_item(NewOrderItem::new(world.product_id(&product), quantity));
    match world.api().create_order(&cashier(), request).await {
        Ok(order) => {
            world.orders.insert(name, order.order_no);
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "I add {int} x {word} to order {string}")]
async fn add_items(world: &mut PosWorld, quantity: i64, product: String, name: String) {
    let no = world.order_no(&name);
    let items = vec![NewOrderItem::new(world.product_id(&product), quantity)];
    if let Err(e) = world.api().append_items(&cashier(), &no, items).await {
        world.last_error = Some(e);
    }
}

#[when(expr = "I take {int} in cash for order {string}")]
async fn cash(world: &mut PosWorld, amount: i64, name: String) {
    let no = world.order_no(&name);
    if let Err(e) = world.api().cash_paid(&cashier(), &no, Money::from(amount)).await {
        world.last_error = Some(e);
    }
}

#[when(expr = "I move order {string} to table {int}")]
async fn turn_table(world: &mut PosWorld, name: String, table: usize) {
    let no = world.order_no(&name);
    if let Err(e) = world.api().turn_table(&cashier(), &no, world.table_id(table)).await {
        world.last_error = Some(e);
    }
}

#[when(expr = "the customer scans a WeChat code to pay {int} for order {string}")]
async fn pay_wechat(world: &mut PosWorld, amount: i64, name: String) {
    let no = world.order_no(&name);
    let request = OnlinePayRequest {
        provider: ProviderKind::Huifu,
        amount: Money::from(amount),
        auth_code: Some("134567890123456789".into()),
        member_token: None,
        description: None,
    };
    match world.api().pay_online(&cashier(), &no, request).await {
        Ok(payment) => {
            world.payments.insert(name, payment);
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "Huifu reports the payment for order {string} as {word}")]
async fn huifu_reports(world: &mut PosWorld, name: String, stat: String) {
    let payment = world.payments.get(&name).cloned().unwrap_or_else(|| panic!("No payment for order {name}"));
    let payments = world.system().engine.payments();
    let payload = huifu_notification(&payment.seq_no, payment.amount, &stat);
    let job = payments.receive_callback(ProviderKind::Huifu, &payload).await.expect("Error storing callback");
    let result = payments.process_payment_callback(&job).await.expect("Error processing callback");
    if let CallbackResult::Applied(updated) = result {
        world.payments.insert(name, updated);
    }
}

#[then(expr = "order {string} costs {int}")]
async fn order_costs(world: &mut PosWorld, name: String, amount: i64) {
    let order = world.api().order(&world.order_no(&name)).await.expect("Error fetching order");
    assert_eq!(order.real_price, Money::from(amount));
}

#[then(expr = "order {string} is {word}")]
async fn order_status(world: &mut PosWorld, name: String, status: String) {
    let order = world.api().order(&world.order_no(&name)).await.expect("Error fetching order");
    let expected: OrderStatus = status.parse().expect("Not an order status");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {string} has been paid {int}")]
async fn order_paid(world: &mut PosWorld, name: String, amount: i64) {
    let order = world.api().order(&world.order_no(&name)).await.expect("Error fetching order");
    assert_eq!(order.paid, Money::from(amount));
}

#[then(expr = "order {string} has a finish time")]
async fn order_finished(world: &mut PosWorld, name: String) {
    let order = world.api().order(&world.order_no(&name)).await.expect("Error fetching order");
    assert!(order.finished_at.is_some());
}

#[then(expr = "order {string} logged {int} {string} event(s)")]
async fn order_logged(world: &mut PosWorld, name: String, count: usize, event: String) {
    let logs = world.api().order_logs(&world.order_no(&name)).await.expect("Error fetching logs");
    assert_eq!(logs.iter().filter(|l| l.event == event).count(), count);
}

#[then(expr = "the payment for order {string} is {word}")]
async fn payment_state(world: &mut PosWorld, name: String, state: String) {
    let payment = world.payments.get(&name).unwrap_or_else(|| panic!("No payment for order {name}"));
    let expected = match state.as_str() {
        "Processing" => PaymentState::Processing,
        "Success" => PaymentState::Success,
        "Failure" => PaymentState::Failure,
        "Waiting" => PaymentState::Waiting,
        s => panic!("Unknown payment state {s}"),
    };
    assert_eq!(payment.state, expected);
}

#[then(expr = "table {int} is {word}")]
async fn table_status(world: &mut PosWorld, table: usize, status: String) {
    let table = world.api().table(world.table_id(table)).await.expect("Error fetching table");
    let expected = match status.as_str() {
        "Free" => TableStatus::Free,
        "Occupied" => TableStatus::Occupied,
        "Disabled" => TableStatus::Disabled,
        s => panic!("Unknown table status {s}"),
    };
    assert_eq!(table.status, expected);
}

#[then(expr = "the last operation failed with {string}")]
async fn last_error(world: &mut PosWorld, message: String) {
    let err = world.last_error.take().expect("The last operation did not fail");
    assert!(err.to_string().contains(&message), "'{err}' does not contain '{message}'");
}
