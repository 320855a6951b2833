use anyhow::Context;
use workflow_cli::output::print_json;
use workflow_core::config::{ToolConfig, WarnLevel};
use workflow_core::paths;

/// Print the effective configuration, then report anything suspicious in it.
pub fn run(json: bool) -> anyhow::Result<()> {
    let config_dir = paths::config_dir()?;
    let config = ToolConfig::load(&config_dir).context("failed to load config.yaml")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "config_dir": config_dir,
            "settings": paths::settings_path(&config_dir),
            "session": paths::session_path(&config_dir),
            "config": config,
            "warnings": warnings,
        });
        print_json(&value)?;
    } else {
        println!("# {}", paths::settings_path(&config_dir).display());
        println!("# session: {}", paths::session_path(&config_dir).display());
        print!("{}", serde_yaml::to_string(&config)?);
        println!();

        if warnings.is_empty() {
            println!("Config is valid. No warnings.");
        } else {
            for w in &warnings {
                let prefix = match w.level {
                    WarnLevel::Warning => "warning",
                    WarnLevel::Error => "error",
                };
                println!("[{prefix}] {}", w.message);
            }
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
