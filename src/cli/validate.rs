use std::path::Path;

use anyhow::Context;
use ballast::infrastructure::config::Config;

/// Validate configuration file without building any service.
pub fn execute(config_path: &Path) -> anyhow::Result<()> {
    println!("Checking configuration: {}", config_path.display());
    println!();

    let config = Config::load(config_path)
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;
    let policy = config.reconnect.to_policy()?;
    let limits = config.throttle.limits()?;

    println!("✓ Configuration file is valid");
    println!();
    println!("Summary:");
    println!("  Store: {}", config.store.backend.as_str());
    if let Some(url) = &config.store.url {
        println!("  Store URL: {url}");
    }
    println!("  Key prefix: {}", config.store.key_prefix);
    println!("  Store timeout: {}ms", config.store.op_timeout_ms);
    println!(
        "  Reconnect: {} retries, {:?} .. {:?}, x{} backoff, ±{}% jitter",
        policy.max_retries(),
        policy.initial_delay(),
        policy.max_delay(),
        policy.backoff_factor(),
        policy.jitter_fraction() * 100.0
    );
    println!("  Throttle presets:");
    for (name, limit) in &limits {
        println!(
            "    {name}: {} requests / {}s",
            limit.max_requests(),
            limit.window().as_secs()
        );
    }
    if config.cache.is_empty() {
        println!("  Caches: none");
    } else {
        println!("  Caches:");
        for (name, cache) in &config.cache {
            let ttl = cache
                .default_ttl_secs
                .map_or_else(|| "none".to_string(), |s| format!("{s}s"));
            let cap = cache
                .max_entries
                .map_or_else(|| "unbounded".to_string(), |n| n.to_string());
            println!("    {name}: default ttl {ttl}, capacity {cap}");
        }
    }
    println!();
    println!("Configuration is ready to use.");
    Ok(())
}
