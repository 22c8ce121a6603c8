pub mod types;

pub use types::*;

use anyhow::{Context, Result, bail};
use std::path::Path;

/// Main configuration loading function
pub fn load_config(config_file: &str) -> Result<Config> {
    if !Path::new(config_file).exists() {
        bail!("configuration file {} not found", config_file);
    }
    let contents = std::fs::read_to_string(config_file)
        .with_context(|| format!("failed to read {}", config_file))?;
    let input: ConfigInput = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", config_file))?;
    input.resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/dbrecon.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_config_parses_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "settings:\n  source_schemas: [HR, FIN]\n  client_timeout_secs: 30\ntarget:\n  host: db.example.com\n  port: 2883"
        )
        .unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.schemas, vec!["HR", "FIN"]);
        assert_eq!(config.target.host, "db.example.com");
        assert_eq!(config.target.port, 2883);
        assert_eq!(config.client_timeout.as_secs(), 30);
    }

    #[test]
    fn test_load_config_rejects_bad_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "settings: [not a map").unwrap();
        assert!(load_config(file.path().to_str().unwrap()).is_err());
    }
}
