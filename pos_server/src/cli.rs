use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 23] = [
        "RUST_LOG",
        "POS_HOST",
        "POS_PORT",
        "POS_DATABASE_URL",
        "POS_DB_MAX_CONNECTIONS",
        "POS_LOCK_STORE",
        "POS_LOCK_EXPIRY_MS",
        "POS_LOCK_WAIT_MS",
        "POS_LOCK_RETRY_MS",
        "POS_ORDER_PREFIX",
        "POS_PAYMENT_PREFIX",
        "POS_CALLBACK_RETRY_ATTEMPTS",
        "POS_CALLBACK_RETRY_DELAY_MS",
        "POS_JOB_TIMEOUT_SECS",
        "POS_JOB_MAX_ATTEMPTS",
        "POS_JOB_RETRY_DELAY_MS",
        "POS_WEBHOOK_HMAC_CHECKS",
        "POS_PROVIDER_SANDBOX",
        "POS_PROVIDER_TIMEOUT_SECS",
        "POS_HUIFU_MCH_ID",
        "POS_HUIFU_BASE_URL",
        "POS_ZXH_MERCHANT_NO",
        "POS_ZXH_BASE_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
