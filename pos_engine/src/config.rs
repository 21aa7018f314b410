//! Engine configuration, read from `POS_*` environment variables.
//!
//! Every setting has a default. Values that cannot be parsed are logged and replaced by the default, so a typo never
//! stops the engine from starting.
use std::{env, str::FromStr, sync::Arc, time::Duration};

use log::*;
use pos_common::{
    helpers::{parse_boolean_flag, parse_millis},
    Secret,
};
use serde_json::json;

use crate::{
    db::sqlite::DEFAULT_SQLITE_DB_URL,
    db_types::ProviderKind,
    lock::{LockOptions, DEFAULT_LOCK_EXPIRY, DEFAULT_LOCK_RETRY_DELAY, DEFAULT_LOCK_WAIT},
    providers::{
        HttpTransport,
        HuifuConfig,
        HuifuProvider,
        MemoryTransport,
        MICROPAY_PATH,
        POINTS_PAY_PATH,
        ProviderError,
        ProviderRegistry,
        ProviderTransport,
        RetryPolicy,
        ZhiXinHuaConfig,
        ZhiXinHuaPointsProvider,
        ZhiXinHuaWalletProvider,
        WALLET_PAY_PATH,
    },
    sequence::{DEFAULT_ORDER_PREFIX, DEFAULT_PAYMENT_PREFIX},
};

pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 1;
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStoreKind {
    /// Leases live in this process only.
    Memory,
    /// Leases live in the `locks` table and are shared by every process using the database.
    Sqlite,
}

impl FromStr for LockStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(format!("{s} is not a lock store. Use 'memory' or 'sqlite'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub lock_store: LockStoreKind,
    pub lock: LockOptions,
    pub order_prefix: String,
    pub payment_prefix: String,
    /// How point-wallet callbacks retry a payment that is not visible yet.
    pub callback_retry: RetryPolicy,
    pub providers: ProviderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_SQLITE_DB_URL.to_string(),
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            lock_store: LockStoreKind::Sqlite,
            lock: LockOptions::default(),
            order_prefix: DEFAULT_ORDER_PREFIX.to_string(),
            payment_prefix: DEFAULT_PAYMENT_PREFIX.to_string(),
            callback_retry: RetryPolicy::default(),
            providers: ProviderConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let database_url = env::var("POS_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ POS_DATABASE_URL is not set. Using {DEFAULT_SQLITE_DB_URL}");
            defaults.database_url.clone()
        });
        let max_connections = parse_or_default("POS_DB_MAX_CONNECTIONS", defaults.max_connections);
        let lock_store = parse_or_default("POS_LOCK_STORE", defaults.lock_store);
        let lock = LockOptions {
            expiry: millis_or_default("POS_LOCK_EXPIRY_MS", DEFAULT_LOCK_EXPIRY),
            wait: millis_or_default("POS_LOCK_WAIT_MS", DEFAULT_LOCK_WAIT),
            retry_delay: millis_or_default("POS_LOCK_RETRY_MS", DEFAULT_LOCK_RETRY_DELAY),
        };
        let order_prefix = env::var("POS_ORDER_PREFIX").ok().unwrap_or(defaults.order_prefix);
        let payment_prefix = env::var("POS_PAYMENT_PREFIX").ok().unwrap_or(defaults.payment_prefix);
        let callback_retry = RetryPolicy {
            attempts: parse_or_default("POS_CALLBACK_RETRY_ATTEMPTS", defaults.callback_retry.attempts),
            delay: millis_or_default("POS_CALLBACK_RETRY_DELAY_MS", defaults.callback_retry.delay),
        };
        let providers = ProviderConfig::from_env_or_default();
        Self {
            database_url,
            max_connections,
            lock_store,
            lock,
            order_prefix,
            payment_prefix,
            callback_retry,
            providers,
        }
    }
}

fn parse_or_default<T>(var: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default:?}, instead.");
            default
        }),
        Err(_) => default,
    }
}

fn millis_or_default(var: &str, default: Duration) -> Duration {
    let value = env::var(var).ok();
    match (&value, parse_millis(value.clone())) {
        (None, _) => default,
        (Some(_), Some(d)) => d,
        (Some(s), None) => {
            warn!("🪛️ {s} is not a valid millisecond count for {var}. Using the default, {default:?}, instead.");
            default
        },
    }
}

//------------------------------------------   Providers   -------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct HuifuSettings {
    pub base_url: String,
    pub mch_id: String,
    /// The key webhook notifications are signed with.
    pub webhook_secret: Secret<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ZhiXinHuaSettings {
    pub base_url: String,
    pub merchant_no: String,
    pub webhook_secret: Secret<String>,
}

/// Which payment providers to register, and how to reach them. A provider without a merchant id is left out.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub huifu: Option<HuifuSettings>,
    pub zhixinhua: Option<ZhiXinHuaSettings>,
    pub timeout: Duration,
    /// Answer every provider call locally with an acceptance instead of calling the gateway.
    pub sandbox: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self { huifu: None, zhixinhua: None, timeout: DEFAULT_PROVIDER_TIMEOUT, sandbox: false }
    }
}

impl ProviderConfig {
    pub fn from_env_or_default() -> Self {
        let huifu = env::var("POS_HUIFU_MCH_ID").ok().filter(|s| !s.is_empty()).map(|mch_id| HuifuSettings {
            base_url: env::var("POS_HUIFU_BASE_URL").unwrap_or_else(|_| "https://api.huifu.com".into()),
            mch_id,
            webhook_secret: secret_from_env("POS_HUIFU_WEBHOOK_SECRET"),
        });
        let zhixinhua =
            env::var("POS_ZXH_MERCHANT_NO").ok().filter(|s| !s.is_empty()).map(|merchant_no| ZhiXinHuaSettings {
                base_url: env::var("POS_ZXH_BASE_URL").unwrap_or_else(|_| "https://open.zhixinhua.com".into()),
                merchant_no,
                webhook_secret: secret_from_env("POS_ZXH_WEBHOOK_SECRET"),
            });
        let timeout = env::var("POS_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ {s} is not a valid value for POS_PROVIDER_TIMEOUT_SECS. {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT);
        let sandbox = parse_boolean_flag(env::var("POS_PROVIDER_SANDBOX").ok(), false);
        if sandbox {
            warn!("🚨️ Payment providers are in sandbox mode. No real payments will be made.");
        }
        if huifu.is_none() && zhixinhua.is_none() {
            warn!("🪛️ No payment provider is configured. Only cash payments will be accepted.");
        }
        Self { huifu, zhixinhua, timeout, sandbox }
    }

    /// The secret that webhook notifications from `provider` are signed with, if that provider is configured.
    pub fn webhook_secret(&self, provider: ProviderKind) -> Option<&Secret<String>> {
        match provider {
            ProviderKind::Huifu => self.huifu.as_ref().map(|h| &h.webhook_secret),
            ProviderKind::ZhiXinHuaPoints | ProviderKind::ZhiXinHuaWallet => {
                self.zhixinhua.as_ref().map(|z| &z.webhook_secret)
            },
        }
    }

    /// Constructs and registers every configured provider.
    pub fn build_registry(&self, callback_retry: RetryPolicy) -> Result<ProviderRegistry, ProviderError> {
        let mut registry = ProviderRegistry::new();
        if let Some(huifu) = &self.huifu {
            let transport = self.transport(&huifu.base_url, &[(MICROPAY_PATH, sandbox_huifu_response())])?;
            registry.register(HuifuProvider::new(HuifuConfig { mch_id: huifu.mch_id.clone() }, transport));
        }
        if let Some(zxh) = &self.zhixinhua {
            let accepted = json!({"code": 0, "msg": "sandbox"});
            let transport =
                self.transport(&zxh.base_url, &[(POINTS_PAY_PATH, accepted.clone()), (WALLET_PAY_PATH, accepted)])?;
            let config = ZhiXinHuaConfig { merchant_no: zxh.merchant_no.clone(), callback_retry };
            registry.register(ZhiXinHuaPointsProvider::new(config.clone(), Arc::clone(&transport)));
            registry.register(ZhiXinHuaWalletProvider::new(config, transport));
        }
        Ok(registry)
    }

    fn transport(
        &self,
        base_url: &str,
        sandbox_responses: &[(&str, serde_json::Value)],
    ) -> Result<Arc<dyn ProviderTransport>, ProviderError> {
        if self.sandbox {
            let transport = MemoryTransport::new();
            for (path, response) in sandbox_responses {
                transport.set_fallback(path, response.clone());
            }
            return Ok(Arc::new(transport));
        }
        Ok(Arc::new(HttpTransport::new(base_url, self.timeout)?))
    }
}

fn sandbox_huifu_response() -> serde_json::Value {
    json!({"resp_code": "00000100", "resp_desc": "sandbox", "trade_type": "T_MICROPAY"})
}

fn secret_from_env(var: &str) -> Secret<String> {
    let value = env::var(var).ok().unwrap_or_else(|| {
        warn!("🪛️ {var} is not set. Webhooks from this provider cannot be verified.");
        String::default()
    });
    Secret::new(value)
}
