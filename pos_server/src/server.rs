use std::time::Duration;

use actix_web::{
    dev::{HttpServiceFactory, Server},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use pos_engine::PosEngine;

use crate::{
    callback_worker::{start_callback_worker, CallbackJobQueue},
    config::ServerConfig,
    errors::ServerError,
    middleware::{HmacMiddlewareFactory, WebhookKeys, WEBHOOK_SIGNATURE_HEADER},
    routes::{
        add_cart_item,
        append_items,
        cancel,
        cart,
        cash_paid,
        change_item_price,
        checkout,
        clear_cart,
        close_payment,
        complete,
        create_order,
        discount,
        export_orders,
        health,
        order_by_no,
        order_logs,
        pay_online,
        payment_webhook,
        remove_cart_item,
        remove_items,
        search_orders,
        turn_table,
        update_cart_item,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let engine =
        PosEngine::from_config(&config.engine).await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let (queue, _worker) = start_callback_worker(engine.payments(), config.jobs);
    let srv = create_server_instance(config, engine, queue)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    engine: PosEngine,
    queue: CallbackJobQueue,
) -> Result<Server, ServerError> {
    let keys = WebhookKeys::from(&config.engine.providers);
    let hmac_checks = config.hmac_checks;
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("pos::access_log"))
            .app_data(web::Data::from(engine.api()))
            .app_data(web::Data::from(engine.orders()))
            .app_data(web::Data::from(engine.payments()))
            .app_data(web::Data::new(queue.clone()))
            .configure(configure_routes)
            .service(webhook_scope(keys.clone(), hmac_checks))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Every route except the provider webhooks.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(search_orders)
        .service(export_orders)
        .service(create_order)
        .service(order_by_no)
        .service(order_logs)
        .service(append_items)
        .service(remove_items)
        .service(discount)
        .service(change_item_price)
        .service(turn_table)
        .service(cancel)
        .service(complete)
        .service(cash_paid)
        .service(pay_online)
        .service(close_payment)
        .service(cart)
        .service(add_cart_item)
        .service(update_cart_item)
        .service(remove_cart_item)
        .service(clear_cart)
        .service(checkout);
}

/// `POST /webhook/payments/{provider}`, behind the HMAC check for that provider.
pub fn webhook_scope(keys: WebhookKeys, hmac_checks: bool) -> impl HttpServiceFactory {
    web::scope("/webhook/payments/{provider}")
        .wrap(HmacMiddlewareFactory::new(WEBHOOK_SIGNATURE_HEADER, keys, hmac_checks))
        .route("", web::post().to(payment_webhook))
}
