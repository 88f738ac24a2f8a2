//! `chainrelay check-config`: everything `run` does before connecting.

use anyhow::{Context, Result};
use chainrelay_stream::{load_registry, plan, RelayConfig};
use std::path::Path;

pub fn run(config_path: &Path) -> Result<()> {
    let config = RelayConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let registry = load_registry(&config)?;
    let subscriptions = plan(&config, &registry)?;

    println!("✓ Config '{}' is valid", config_path.display());

    println!("  Chains:");
    for chain in &config.chains {
        let endpoint = match (&chain.ws_url, &chain.ws_url_env) {
            (Some(_), _) => "inline ws_url".to_string(),
            (None, Some(var)) => match chain.resolve_ws_url() {
                Ok(_) => format!("${var}"),
                Err(_) => format!("${var} (NOT SET)"),
            },
            (None, None) => "-".to_string(),
        };
        println!("    - {} ({}) via {}", chain.slug, chain.chain_id, endpoint);
    }

    println!("  Contracts:");
    for name in registry.names() {
        let Some(entry) = registry.get(name) else { continue };
        println!(
            "    - {}: {} events, {} view functions, deployed on {} chains",
            name,
            entry.schema.len(),
            entry.views.len(),
            entry.addresses.len()
        );
        for event in entry.schema.summaries() {
            println!("        {} {}", event.selector, event.signature);
        }
    }

    println!("  Subscriptions:");
    for spec in &subscriptions {
        println!("    - {spec}");
    }

    println!("  Sink endpoints:");
    if config.sink.endpoints.is_empty() {
        println!("    (none; every record will be skipped)");
    }
    for (event, endpoint) in &config.sink.endpoints {
        println!("    - {event} → {endpoint}");
    }
    Ok(())
}
