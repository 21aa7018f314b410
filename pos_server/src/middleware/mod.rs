mod hmac;

pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService, WebhookKeys, WEBHOOK_SIGNATURE_HEADER};
