//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory (or
//! the path given with `-f`), then applies `BRIDGE_BIND` and
//! `BRIDGE_LOG_LEVEL` env overrides. The `[services]` table is passed through
//! untouched; [`crate::settings::Settings`] resolves it against the flags the
//! services declare.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Host HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the listener binds to.
    pub bind: String,
    pub log_level: String,
}

/// Fully-resolved host configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// Raw `[services]` table (`coze = true`, `coze_token = "..."`, …).
    pub services: toml::Table,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: default_bind(),
                log_level: default_log_level(),
            },
            services: toml::Table::new(),
        }
    }
}

/// Raw TOML shape, the `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    services: toml::Table,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self { bind: default_bind(), log_level: default_log_level() }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load config from the given path, or `config/default.toml`, then apply
/// env-var overrides. With no explicit path and no default file present the
/// built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let bind_override = env::var("BRIDGE_BIND").ok();
    let log_level_override = env::var("BRIDGE_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(
            Path::new(path),
            bind_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, bind_override.as_deref(), log_level_override.as_deref())
    } else {
        let mut config = Config::default();
        apply_overrides(&mut config, bind_override.as_deref(), log_level_override.as_deref());
        Ok(config)
    }
}

/// Internal loader. Accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    bind_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let mut config = Config {
        server: ServerConfig {
            bind: parsed.server.bind,
            log_level: parsed.server.log_level,
        },
        services: parsed.services,
    };
    apply_overrides(&mut config, bind_override, log_level_override);
    Ok(config)
}

fn apply_overrides(config: &mut Config, bind: Option<&str>, log_level: Option<&str>) {
    if let Some(bind) = bind {
        config.server.bind = bind.to_string();
    }
    if let Some(level) = log_level {
        config.server.log_level = level.to_string();
    }
}
