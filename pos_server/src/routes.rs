//! Request handler definitions
//!
//! Define each route and its handler here. The handlers are thin: they read the request, call [`OrderApi`] or
//! [`PaymentDomainService`] and serialize the result. Business rules live in the engine.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every engine call is async, so keep it that way: never reach for a
//! blocking call in a handler.
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use log::*;
use pos_engine::{
    db_types::{OrderNo, OrderStatus, ProviderKind},
    order_objects::{NewOrder, NewOrderItem, OnlinePayRequest, OrderQueryFilter},
    OrderApi,
    OrderDomainService,
    PaymentDomainService,
};
use serde::Deserialize;

use crate::{
    callback_worker::CallbackJobQueue,
    data_objects::{
        AppendItemsParams,
        CancelParams,
        CartQuantityParams,
        CashParams,
        ClosePaymentParams,
        DiscountParams,
        JsonResponse,
        OrderDetail,
        RemoveItemsParams,
        TurnTableParams,
        UpdatePriceParams,
    },
    errors::ServerError,
    extractors::RequestOperator,
};

fn order_no(path: web::Path<String>) -> OrderNo {
    OrderNo::from(path.into_inner())
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderSearchParams {
    pub store_id: Option<i64>,
    pub table_id: Option<i64>,
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
}

impl From<OrderSearchParams> for OrderQueryFilter {
    fn from(params: OrderSearchParams) -> Self {
        OrderQueryFilter {
            store_id: params.store_id,
            table_id: params.table_id,
            statuses: params.status.into_iter().collect(),
            limit: params.limit,
            ..Default::default()
        }
    }
}

/// Route handler for the order search endpoint. All query parameters are optional.
#[get("/orders")]
pub async fn search_orders(
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let filter = OrderQueryFilter::from(query.into_inner());
    debug!("💻️ GET orders. {filter}");
    let orders = api.orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

/// Route handler for order exports. Takes the same filters as the search endpoint. Only one export per `export_id`
/// runs at a time; a concurrent request for the same export is turned away with 423 Locked.
#[get("/exports/{export_id}")]
pub async fn export_orders(
    path: web::Path<String>,
    query: web::Query<OrderSearchParams>,
    orders: web::Data<OrderDomainService>,
) -> Result<HttpResponse, ServerError> {
    let export_id = path.into_inner();
    let filter = OrderQueryFilter::from(query.into_inner());
    debug!("💻️ GET export {export_id}. {filter}");
    let orders = orders.export(&export_id, filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

/// Opens an order. Item prices are taken from the catalog, never from the request.
#[post("/orders")]
pub async fn create_order(
    operator: RequestOperator,
    body: web::Json<NewOrder>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST create order from {}", *operator);
    let order = api.create_order(&operator, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

#[get("/orders/{order_no}")]
pub async fn order_by_no(
    path: web::Path<String>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    debug!("💻️ GET order {order_no}");
    let order = api.order(&order_no).await?;
    let payments = api.payments_for_order(&order_no).await?;
    Ok(HttpResponse::Ok().json(OrderDetail { order, payments }))
}

#[get("/orders/{order_no}/logs")]
pub async fn order_logs(path: web::Path<String>, api: web::Data<OrderApi>) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    debug!("💻️ GET logs for order {order_no}");
    let logs = api.order_logs(&order_no).await?;
    Ok(HttpResponse::Ok().json(logs))
}

#[post("/orders/{order_no}/items")]
pub async fn append_items(
    operator: RequestOperator,
    path: web::Path<String>,
    body: web::Json<AppendItemsParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    debug!("💻️ POST append items to {order_no}");
    let order = api.append_items(&operator, &order_no, body.into_inner().items).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[delete("/orders/{order_no}/items")]
pub async fn remove_items(
    operator: RequestOperator,
    path: web::Path<String>,
    body: web::Json<RemoveItemsParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    debug!("💻️ DELETE items from {order_no}");
    let order = api.remove_items(&operator, &order_no, body.into_inner().items).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[post("/orders/{order_no}/discount")]
pub async fn discount(
    operator: RequestOperator,
    path: web::Path<String>,
    body: web::Json<DiscountParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    debug!("💻️ POST discount of {} on {order_no}", body.amount);
    let order = api.discount(&operator, &order_no, body.amount).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[post("/orders/{order_no}/price")]
pub async fn change_item_price(
    operator: RequestOperator,
    path: web::Path<String>,
    body: web::Json<UpdatePriceParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    let UpdatePriceParams { item_id, price } = body.into_inner();
    debug!("💻️ POST price {price} for item {item_id} of {order_no}");
    let order = api.change_item_price(&operator, &order_no, item_id, price).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[post("/orders/{order_no}/turn_table")]
pub async fn turn_table(
    operator: RequestOperator,
    path: web::Path<String>,
    body: web::Json<TurnTableParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    debug!("💻️ POST move {order_no} to table {}", body.table_id);
    let order = api.turn_table(&operator, &order_no, body.table_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[post("/orders/{order_no}/cancel")]
pub async fn cancel(
    operator: RequestOperator,
    path: web::Path<String>,
    body: web::Json<CancelParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    debug!("💻️ POST cancel {order_no}");
    let order = api.cancel(&operator, &order_no, &body.reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[post("/orders/{order_no}/complete")]
pub async fn complete(
    operator: RequestOperator,
    path: web::Path<String>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    debug!("💻️ POST complete {order_no}");
    let order = api.complete(&operator, &order_no).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------

#[post("/orders/{order_no}/cash")]
pub async fn cash_paid(
    operator: RequestOperator,
    path: web::Path<String>,
    body: web::Json<CashParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    debug!("💻️ POST cash payment of {} for {order_no}", body.amount);
    let order = api.cash_paid(&operator, &order_no, body.amount).await?;
    Ok(HttpResponse::Ok().json(order))
}

/// Starts a provider payment. The response is the `Processing` payment; the order changes when the provider's
/// callback arrives.
#[post("/orders/{order_no}/pay")]
pub async fn pay_online(
    operator: RequestOperator,
    path: web::Path<String>,
    body: web::Json<OnlinePayRequest>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let order_no = order_no(path);
    debug!("💻️ POST {} payment of {} for {order_no}", body.provider, body.amount);
    let payment = api.pay_online(&operator, &order_no, body.into_inner()).await?;
    Ok(HttpResponse::Accepted().json(payment))
}

#[post("/payments/{seq_no}/close")]
pub async fn close_payment(
    operator: RequestOperator,
    path: web::Path<String>,
    body: web::Json<ClosePaymentParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let seq_no = path.into_inner();
    debug!("💻️ POST close payment {seq_no}");
    let payment = api.close_payment(&operator, &seq_no, &body.reason).await?;
    Ok(HttpResponse::Ok().json(payment))
}

/// Route handler for provider webhooks, mounted at `/webhook/payments/{provider}`.
///
/// The notification is stored as-is and a job to reconcile it is queued. The provider gets its acknowledgement as
/// soon as the notification is safely stored; the payment and order are updated by the callback worker.
pub async fn payment_webhook(
    path: web::Path<String>,
    body: String,
    payments: web::Data<PaymentDomainService>,
    queue: web::Data<CallbackJobQueue>,
) -> Result<HttpResponse, ServerError> {
    let provider = path
        .into_inner()
        .parse::<ProviderKind>()
        .map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    trace!("💻️ Received {provider} webhook: {body}");
    let job = payments.receive_callback(provider, &body).await.map_err(|e| {
        warn!("💻️ Could not accept {provider} webhook. {e}");
        e
    })?;
    info!("💻️ {provider} webhook stored as {job}");
    queue.enqueue(job)?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Notification received")))
}

//----------------------------------------------   Carts  ----------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutParams {
    pub store_id: i64,
    #[serde(default)]
    pub remark: Option<String>,
}

#[get("/tables/{table_id}/cart")]
pub async fn cart(path: web::Path<i64>, api: web::Data<OrderApi>) -> Result<HttpResponse, ServerError> {
    let table_id = path.into_inner();
    debug!("💻️ GET cart for table {table_id}");
    let items = api.cart(table_id).await?;
    Ok(HttpResponse::Ok().json(items))
}

#[post("/tables/{table_id}/cart")]
pub async fn add_cart_item(
    path: web::Path<i64>,
    body: web::Json<NewOrderItem>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let table_id = path.into_inner();
    debug!("💻️ POST cart item for table {table_id}");
    let item = api.add_cart_item(table_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(item))
}

#[put("/tables/{table_id}/cart/{item_id}")]
pub async fn update_cart_item(
    path: web::Path<(i64, i64)>,
    body: web::Json<CartQuantityParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let (table_id, item_id) = path.into_inner();
    debug!("💻️ PUT cart item {item_id} for table {table_id}");
    let item = api.update_cart_item(table_id, item_id, body.into_inner().quantity).await?;
    Ok(HttpResponse::Ok().json(item))
}

#[delete("/tables/{table_id}/cart/{item_id}")]
pub async fn remove_cart_item(
    path: web::Path<(i64, i64)>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let (table_id, item_id) = path.into_inner();
    debug!("💻️ DELETE cart item {item_id} for table {table_id}");
    api.remove_cart_item(table_id, item_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Item {item_id} removed"))))
}

#[delete("/tables/{table_id}/cart")]
pub async fn clear_cart(path: web::Path<i64>, api: web::Data<OrderApi>) -> Result<HttpResponse, ServerError> {
    let table_id = path.into_inner();
    debug!("💻️ DELETE cart for table {table_id}");
    let count = api.clear_cart(table_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{count} items removed"))))
}

/// Turns a table's cart into an order and empties the cart.
#[post("/tables/{table_id}/checkout")]
pub async fn checkout(
    operator: RequestOperator,
    path: web::Path<i64>,
    body: web::Json<CheckoutParams>,
    api: web::Data<OrderApi>,
) -> Result<HttpResponse, ServerError> {
    let table_id = path.into_inner();
    let CheckoutParams { store_id, remark } = body.into_inner();
    debug!("💻️ POST checkout for table {table_id}");
    let order = api.create_order_from_cart(&operator, store_id, table_id, remark).await?;
    Ok(HttpResponse::Created().json(order))
}
