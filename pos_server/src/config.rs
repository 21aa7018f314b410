use std::{env, time::Duration};

use log::*;
use pos_common::helpers::{parse_boolean_flag, parse_millis};
use pos_engine::EngineConfig;

const DEFAULT_POS_HOST: &str = "127.0.0.1";
const DEFAULT_POS_PORT: u16 = 8360;
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_JOB_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_JOB_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// If false, webhook signatures are not checked. **DANGER**: anyone can then mark payments as paid.
    pub hmac_checks: bool,
    pub jobs: JobConfig,
    pub engine: EngineConfig,
}

/// How the callback worker runs jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobConfig {
    /// A job that runs longer than this is abandoned and counts as a failed attempt.
    pub timeout: Duration,
    /// Attempts per job before the worker gives up on it. The stored callback is kept and retried after a restart.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_JOB_TIMEOUT, max_attempts: DEFAULT_JOB_MAX_ATTEMPTS, retry_delay: DEFAULT_JOB_RETRY_DELAY }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_POS_HOST.to_string(),
            port: DEFAULT_POS_PORT,
            hmac_checks: true,
            jobs: JobConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("POS_HOST").ok().unwrap_or_else(|| DEFAULT_POS_HOST.into());
        let port = env::var("POS_PORT")
            .map_err(|_| info!("🪛️ POS_PORT is not set. Using the default value of {DEFAULT_POS_PORT}."))
            .and_then(|s| s.parse::<u16>().map_err(|e| error!("🪛️ Invalid configuration value for POS_PORT. {e}")))
            .ok()
            .unwrap_or(DEFAULT_POS_PORT);
        let hmac_checks = parse_boolean_flag(env::var("POS_WEBHOOK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are DISABLED. Do not run like this in production.");
        }
        let jobs = JobConfig::from_env_or_default();
        let engine = EngineConfig::from_env_or_default();
        Self { host, port, hmac_checks, jobs, engine }
    }
}

impl JobConfig {
    pub fn from_env_or_default() -> Self {
        let timeout = env::var("POS_JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for POS_JOB_TIMEOUT_SECS. {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_JOB_TIMEOUT);
        let max_attempts = env::var("POS_JOB_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for POS_JOB_MAX_ATTEMPTS. {e}"))
                    .ok()
            })
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_JOB_MAX_ATTEMPTS);
        let retry_delay = parse_millis(env::var("POS_JOB_RETRY_DELAY_MS").ok()).unwrap_or(DEFAULT_JOB_RETRY_DELAY);
        Self { timeout, max_attempts, retry_delay }
    }
}
