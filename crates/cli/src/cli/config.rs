use std::path::Path;

use cl_domain::config::{Config, ConfigSeverity};

/// Print validation issues. Returns `true` when there are no errors.
pub fn validate(config: &Config, config_path: &Path) -> bool {
    let issues = config.validate();
    let shown = config_path.display();

    if issues.is_empty() {
        println!("Config OK ({shown})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{error_count} error(s), {warning_count} warning(s) in {shown}");

    error_count == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{output}");
    Ok(())
}
