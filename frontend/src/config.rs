use anyhow::{Context, Result};
use shared::{AppSection, ToolkitConfig};
use std::path::Path;

/// Overrides `socket.host` when set, as the admin build does.
pub const HOST_ADDRESS_ENV: &str = "HOST_ADDRESS";

pub fn load_config(path: &Path) -> Result<ToolkitConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = ToolkitConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    if !config.app.is_supported_version() {
        log::warn!(
            "Config {} has version {:?}, expected {}",
            path.display(),
            config.app.version,
            AppSection::CURRENT_VERSION
        );
    }

    Ok(config)
}

/// Defaults when no path is given; a given path must load.
pub fn load_config_or_default(path: Option<&Path>) -> Result<ToolkitConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(ToolkitConfig::default()),
    }
}

pub fn apply_env_overrides(config: &mut ToolkitConfig) {
    apply_host_override(config, std::env::var(HOST_ADDRESS_ENV).ok().as_deref());
}

/// Blank values are ignored.
pub fn apply_host_override(config: &mut ToolkitConfig, host: Option<&str>) {
    if let Some(host) = host.map(str::trim).filter(|host| !host.is_empty()) {
        log::debug!("Socket host overridden by {}: {}", HOST_ADDRESS_ENV, host);
        config.socket.host = host.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{DEFAULT_HOST_ADDRESS, DEFAULT_PAGE_SCHEME};
    use std::path::PathBuf;

    struct TempConfig(PathBuf);

    impl TempConfig {
        fn write(content: &str) -> Self {
            let path = std::env::temp_dir().join(format!("toolkit-{}.toml", uuid::Uuid::new_v4()));
            std::fs::write(&path, content).unwrap();
            Self(path)
        }
    }

    impl Drop for TempConfig {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn loads_socket_section_with_defaults() {
        let file = TempConfig::write(
            r#"
[app]
version = "1.0.0"

[socket]
host = "scraper.local:9000"
"#,
        );

        let config = load_config(&file.0).unwrap();

        assert_eq!(config.socket.host, "scraper.local:9000");
        assert_eq!(config.socket.page_scheme, DEFAULT_PAGE_SCHEME);
    }

    #[test]
    fn missing_file_error_names_the_path() {
        let path = std::env::temp_dir().join("toolkit-does-not-exist.toml");
        let error = load_config(&path).unwrap_err();
        assert!(format!("{:#}", error).contains("toolkit-does-not-exist.toml"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = TempConfig::write("[socket\nhost = 1");
        let error = load_config(&file.0).unwrap_err();
        assert!(error.to_string().starts_with("Failed to parse config file"));
    }

    #[test]
    fn no_path_means_defaults() {
        let config = load_config_or_default(None).unwrap();
        assert_eq!(config.socket.host, DEFAULT_HOST_ADDRESS);
    }

    #[test]
    fn host_override() {
        let mut config = ToolkitConfig::default();
        apply_host_override(&mut config, Some("  "));
        assert_eq!(config.socket.host, DEFAULT_HOST_ADDRESS);

        apply_host_override(&mut config, Some("10.1.1.5:8000"));
        assert_eq!(config.socket.host, "10.1.1.5:8000");

        apply_host_override(&mut config, None);
        assert_eq!(config.socket.host, "10.1.1.5:8000");
    }
}
