use super::{database_beside, resolve_config_path};
use quarantine::config::QuarantineConfig;

/// Write a commented default config file.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn execute(config: Option<String>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve_config_path(config);

    if path.exists() && !force {
        return Err(format!(
            "config file '{}' already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    QuarantineConfig::create_default(&path, &database_beside(&path))?;
    println!("Created: {}", path.display());
    println!("Add operator ids under [verify] before running the bot.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_config_writes_loadable_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        execute(Some(path.to_string_lossy().to_string()), false).unwrap();

        let config = QuarantineConfig::load(&path).unwrap();
        assert_eq!(config.storage.database, temp_dir.path().join("quarantine.db"));
    }

    #[test]
    fn test_init_config_refuses_overwrite_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "# hand edited\n").unwrap();
        let arg = Some(path.to_string_lossy().to_string());

        assert!(execute(arg.clone(), false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hand edited\n");

        execute(arg, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[verify]"));
    }
}
