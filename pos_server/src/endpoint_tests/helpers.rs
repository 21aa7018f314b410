use std::{collections::HashMap, time::Duration};

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use log::debug;
use pos_common::Secret;
use pos_engine::{
    db_types::{OrderNo, OrderStatus, ProviderKind},
    test_utils::fixtures::TestSystem,
};

use crate::{
    callback_worker::{start_callback_worker, CallbackJobQueue},
    config::JobConfig,
    extractors::{OPERATOR_ID_HEADER, OPERATOR_NAME_HEADER, OPERATOR_TYPE_HEADER},
    helpers::calculate_hmac,
    middleware::{WebhookKeys, WEBHOOK_SIGNATURE_HEADER},
    server::{configure_routes, webhook_scope},
};

pub const WEBHOOK_SECRET: &str = "not-a-real-webhook-secret";

/// A fresh engine and database, plus a running callback worker.
pub struct TestServer {
    pub system: TestSystem,
    pub queue: CallbackJobQueue,
}

impl TestServer {
    pub async fn new() -> Self {
        let system = TestSystem::new().await;
        let jobs = JobConfig { timeout: Duration::from_secs(5), max_attempts: 3, retry_delay: Duration::from_millis(20) };
        let (queue, _worker) = start_callback_worker(system.engine.payments(), jobs);
        Self { system, queue }
    }

    /// Sends `req` through the full route table and returns the status and body. Errors raised by middleware are
    /// converted to their responses.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, String) {
        let app = App::new()
            .app_data(web::Data::from(self.system.engine.api()))
            .app_data(web::Data::from(self.system.engine.orders()))
            .app_data(web::Data::from(self.system.engine.payments()))
            .app_data(web::Data::new(self.queue.clone()))
            .configure(configure_routes)
            .service(webhook_scope(test_keys(), true));
        let service = test::init_service(app).await;
        debug!("Making request");
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            Err(e) => (e.error_response().status(), e.to_string()),
        }
    }

    pub async fn wait_for_status(&self, order_no: &OrderNo, status: OrderStatus) -> bool {
        for _ in 0..100 {
            let order = self.system.engine.api().order(order_no).await.expect("Error fetching order");
            if order.status == status {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

pub fn test_keys() -> WebhookKeys {
    let keys = [ProviderKind::Huifu, ProviderKind::ZhiXinHuaPoints, ProviderKind::ZhiXinHuaWallet]
        .into_iter()
        .map(|kind| (kind, Secret::new(WEBHOOK_SECRET.to_string())))
        .collect::<HashMap<_, _>>();
    WebhookKeys::new(keys)
}

/// Adds the operator headers for the cashier used throughout the engine fixtures.
pub fn as_cashier(req: TestRequest) -> TestRequest {
    req.insert_header((OPERATOR_TYPE_HEADER, "Frontend"))
        .insert_header((OPERATOR_ID_HEADER, "7"))
        .insert_header((OPERATOR_NAME_HEADER, "Alice"))
}

/// A webhook request for `provider`, signed with the test secret.
pub fn signed_webhook(provider: &str, payload: &str) -> TestRequest {
    TestRequest::post()
        .uri(&format!("/webhook/payments/{provider}"))
        .insert_header((WEBHOOK_SIGNATURE_HEADER, calculate_hmac(WEBHOOK_SECRET, payload.as_bytes())))
        .set_payload(payload.to_string())
}
