use ar_domain::config::{Config, ConfigSeverity};

/// Report config issues plus missing local files. Returns false when the
/// gateway would refuse to start.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();

    for issue in &issues {
        println!("{issue}");
    }
    let files = [
        ("agent.instructions_file", &config.agent.instructions_file),
        ("database.path", &config.database.path),
    ];
    let mut missing = 0;
    for (field, path) in files {
        if !path.is_file() {
            println!("[MISSING] {field}: {} not found", path.display());
            missing += 1;
        }
    }

    if issues.is_empty() && missing == 0 {
        println!("{config_path}: OK");
    } else {
        println!(
            "\n{config_path}: {errors} error(s), {} warning(s), {missing} missing file(s)",
            issues.len() - errors
        );
    }
    errors == 0
}

/// Print the resolved config, defaults included, as TOML.
pub fn show(config: &Config, config_path: &str) -> anyhow::Result<()> {
    println!("# resolved from {config_path}");
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
