//! Layered configuration: TOML file, overridden by CLI flags, resolved once
//! at startup into a process-wide handle.

use crate::DEFAULT_PORT;
use lazy_static::lazy_static;
use serde::Deserialize;
use std::sync::RwLock;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    server: Server,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct Server {
    listen: Option<String>,
    port: Option<u16>,
    log_level: Option<String>,
    aof_path: Option<String>,
    cleanup_interval_secs: Option<u64>,
    aof_flush_interval_secs: Option<u64>,
}

lazy_static! {
    static ref SERVER_CONFIG: RwLock<Config> = RwLock::new(Config::default());
}

pub fn set_global_config(config: Config) {
    *SERVER_CONFIG.write().unwrap() = config;
}

pub fn config_listen_or_default() -> String {
    SERVER_CONFIG
        .read()
        .unwrap()
        .server
        .listen
        .clone()
        .unwrap_or_else(|| "0.0.0.0".to_string())
}

pub fn config_port_or_default() -> u16 {
    SERVER_CONFIG
        .read()
        .unwrap()
        .server
        .port
        .unwrap_or_else(|| DEFAULT_PORT.parse().unwrap())
}

pub fn config_log_level_or_default() -> String {
    SERVER_CONFIG
        .read()
        .unwrap()
        .server
        .log_level
        .clone()
        .unwrap_or_else(|| "info".to_string())
}

pub fn config_aof_path_or_default() -> String {
    SERVER_CONFIG
        .read()
        .unwrap()
        .server
        .aof_path
        .clone()
        .unwrap_or_else(|| "appendonly.aof".to_string())
}

pub fn config_cleanup_interval_secs_or_default() -> u64 {
    SERVER_CONFIG
        .read()
        .unwrap()
        .server
        .cleanup_interval_secs
        .unwrap_or(1)
}

pub fn config_aof_flush_interval_secs_or_default() -> u64 {
    SERVER_CONFIG
        .read()
        .unwrap()
        .server
        .aof_flush_interval_secs
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        set_global_config(Config::default());
        assert_eq!(config_port_or_default(), 6380);
        assert_eq!(config_aof_path_or_default(), "appendonly.aof");
    }

    #[test]
    fn toml_overrides_take_effect() {
        let toml = r#"
            [server]
            port = 7000
            aof_path = "/tmp/test.aof"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        set_global_config(config);
        assert_eq!(config_port_or_default(), 7000);
        assert_eq!(config_aof_path_or_default(), "/tmp/test.aof");
        set_global_config(Config::default());
    }
}
