//! `turnstile config`: Configuration management commands.

use turnstile_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set TURNSTILE_API_KEY or OPENAI_API_KEY)");
            }
            if config.knowledge.source == "none" {
                warnings.push("No knowledge source configured; turns run without a knowledge document");
            }
            if config.checkpoint.backend == "memory" {
                warnings.push("Memory checkpoint backend: conversations are lost on exit");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:    {}", config.default_provider);
            println!("   Primary:     {}", config.primary_model);
            println!("   Secondary:   {}", config.secondary_model);
            println!("   Knowledge:   {}", config.knowledge.source);
            println!("   Checkpoint:  {}", config.checkpoint.backend);
            println!(
                "   Injection:   cooldown {} / staleness {} turns, {} keywords",
                config.injection.cooldown_turns,
                config.injection.max_staleness_turns,
                config.injection.trigger_keywords.len()
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", toml::to_string_pretty(&redacted(config))?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

fn redacted(mut config: AppConfig) -> AppConfig {
    const MASK: &str = "***";
    if config.api_key.is_some() {
        config.api_key = Some(MASK.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(MASK.into());
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn api_keys_are_masked() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        let shown = toml::to_string_pretty(&redacted(config)).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("***"));
    }
}
