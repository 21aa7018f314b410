//! HMAC middleware for Actix Web.
//!
//! Payment providers sign their webhook notifications with a shared secret. The signature is the base64-encoded
//! HMAC-SHA256 of the raw request body and is sent in the [`WEBHOOK_SIGNATURE_HEADER`] header.
//!
//! Each provider has its own secret, so the middleware must wrap a scope whose path captures the provider as
//! `{provider}`. Requests for a provider without a configured secret are refused.
use std::{
    collections::HashMap,
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorForbidden},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use pos_common::Secret;
use pos_engine::{config::ProviderConfig, db_types::ProviderKind};

use crate::helpers::verify_hmac;

pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Pos-Signature";

/// The webhook signing secret of every configured provider.
#[derive(Debug, Clone, Default)]
pub struct WebhookKeys(Arc<HashMap<ProviderKind, Secret<String>>>);

impl WebhookKeys {
    pub fn new(keys: HashMap<ProviderKind, Secret<String>>) -> Self {
        Self(Arc::new(keys))
    }

    pub fn get(&self, provider: ProviderKind) -> Option<&Secret<String>> {
        self.0.get(&provider).filter(|s| !s.is_empty())
    }
}

impl From<&ProviderConfig> for WebhookKeys {
    fn from(config: &ProviderConfig) -> Self {
        let keys = [ProviderKind::Huifu, ProviderKind::ZhiXinHuaPoints, ProviderKind::ZhiXinHuaWallet]
            .into_iter()
            .filter_map(|kind| config.webhook_secret(kind).map(|s| (kind, s.clone())))
            .collect();
        Self::new(keys)
    }
}

pub struct HmacMiddlewareFactory {
    hmac_header: String,
    keys: WebhookKeys,
    // If false, then the middleware will not check the HMAC signature and always allow the call
    enabled: bool,
}

impl HmacMiddlewareFactory {
    pub fn new(hmac_header: &str, keys: WebhookKeys, enabled: bool) -> Self {
        HmacMiddlewareFactory { hmac_header: hmac_header.into(), keys, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService {
            hmac_header: self.hmac_header.clone(),
            keys: self.keys.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S> {
    hmac_header: String,
    keys: WebhookKeys,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let keys = self.keys.clone();
        let hmac_header = self.hmac_header.clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking HMAC for webhook request");
            if !enabled {
                trace!("🔐️ HMAC checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let provider = req
                .match_info()
                .get("provider")
                .and_then(|p| p.parse::<ProviderKind>().ok())
                .ok_or_else(|| ErrorBadRequest("Unknown payment provider."))?;
            let secret = keys.get(provider).map(|s| s.reveal().clone()).ok_or_else(|| {
                warn!("🔐️ No webhook secret is configured for {provider}. denying access.");
                ErrorForbidden("Webhooks from this provider are not accepted.")
            })?;
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let hmac = req.headers().get(&hmac_header).ok_or_else(|| {
                warn!("🔐️ No HMAC signature found in {provider} webhook. denying access.");
                ErrorForbidden("No HMAC signature found.")
            })?;
            let validated = verify_hmac(&secret, data.as_ref(), hmac.as_bytes());
            if validated {
                trace!("🔐️ HMAC check for {provider} webhook ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid HMAC signature found in {provider} webhook. denying access.");
                Err(ErrorForbidden("Invalid HMAC signature."))
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
