use std::path::Path;

use anyhow::Context as _;
use chatmux_core::config::ConfigFile;

/// Reads the config file at `path`. A missing file yields defaults.
pub async fn load_config(path: &Path) -> anyhow::Result<ConfigFile> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ConfigFile::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read config: {}", path.display()));
        }
    };

    ConfigFile::from_toml_str(&raw).with_context(|| format!("load config: {}", path.display()))
}

/// Keys in the file that nothing reads; usually typos.
pub fn unknown_keys(cfg: &ConfigFile) -> Vec<&str> {
    cfg.extra.keys().map(String::as_str).collect()
}
