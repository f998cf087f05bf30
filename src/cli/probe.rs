use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use ballast::infrastructure::config::Config;
use ballast::runtime::{connect_store, ResultCache};

const PROBE_CACHE: &str = "probe";

/// Connect to the configured backing store and exercise a round trip.
pub async fn execute(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;
    config.init_logging();

    println!("Probing {} store...", config.store.backend.as_str());

    let store = connect_store(&config.store)
        .await
        .context("failed to open backing store")?;

    print!("Ping... ");
    match tokio::time::timeout(config.store.op_timeout(), store.ping()).await {
        Ok(Ok(())) => println!("✓ OK"),
        Ok(Err(e)) => {
            println!("✗ Failed");
            return Err(e).context("store ping failed");
        }
        Err(_) => {
            println!("✗ Timed out");
            bail!("store ping exceeded {}ms", config.store.op_timeout_ms);
        }
    }

    print!("Cache round trip... ");
    let cache = ResultCache::new(PROBE_CACHE, Arc::clone(&store))?
        .with_key_prefix(&config.store.key_prefix)
        .with_op_timeout(config.store.op_timeout());
    let written = cache
        .set("roundtrip", &"ok", Some(Duration::from_secs(10)))
        .await;
    let read: Option<String> = cache.get("roundtrip").await;
    cache.delete("roundtrip").await;
    if written && read.as_deref() == Some("ok") {
        println!("✓ OK");
    } else {
        println!("✗ Failed");
        bail!("store accepted the connection but did not return the probe value");
    }

    println!();
    println!("Backing store is reachable.");
    Ok(())
}
