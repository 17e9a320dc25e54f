//! `provctl config`

use crate::Context;
use crate::config::Config;
use crate::paths;
use crate::ui;
use anyhow::Result;

pub fn run(_ctx: &Context) -> Result<()> {
    let path = paths::config_file()?;
    let config = Config::load()?;

    ui::header("Configuration");
    ui::kv("file", &path.display().to_string());
    if !path.exists() {
        ui::dim("(not found, using defaults)");
    }

    ui::section("Tenant");
    ui::kv(
        "url",
        config.tenant.url.as_deref().unwrap_or("(not set)"),
    );
    ui::kv("token variable", &config.tenant.token_env);
    ui::kv("timeout", &format!("{}s", config.tenant.timeout_secs));

    ui::section("Retry");
    ui::kv("attempts", &config.retry.max_attempts.to_string());
    ui::kv("base delay", &format!("{}ms", config.retry.base_delay_ms));
    ui::kv("backoff", &config.retry.backoff_factor.to_string());
    Ok(())
}
