//! `turnstile doctor` — Diagnose system health.

use turnstile_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 turnstile Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — run `turnstile init` (using defaults)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the configuration and re-run doctor.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
        match turnstile_providers::build_from_config(&config).resolve(None) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => {
                    println!("  ✅ Provider '{}' reachable", provider.name());
                    let models = provider.list_models().await.unwrap_or_default();
                    for model in [&config.primary_model, &config.secondary_model] {
                        if !models.is_empty() && !models.contains(model) {
                            println!("  ⚠️  Model '{model}' not listed by '{}'", provider.name());
                            issues += 1;
                        }
                    }
                }
                Ok(false) => {
                    println!("  ⚠️  Provider '{}' answered but reported unhealthy", provider.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  No API key configured — add api_key to config.toml");
        issues += 1;
    }

    match turnstile_tools::build_from_config(&config.knowledge) {
        Ok(source) => match source.fetch().await {
            Ok(fetch) => match fetch.non_empty() {
                Some(document) => {
                    println!("  ✅ Knowledge source '{}' returned {} chars", source.name(), document.len())
                }
                None => {
                    println!("  ⚠️  Knowledge source '{}' returned no document", source.name());
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Knowledge source '{}' failed: {e}", source.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Knowledge source invalid: {e}");
            issues += 1;
        }
    }

    match turnstile_checkpoint::build_from_config(&config).await {
        Ok(store) => match store.list_threads().await {
            Ok(threads) => println!(
                "  ✅ Checkpoint store '{}' ready ({} threads)",
                store.name(),
                threads.len()
            ),
            Err(e) => {
                println!("  ❌ Checkpoint store '{}' unreadable: {e}", store.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Checkpoint store unavailable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
