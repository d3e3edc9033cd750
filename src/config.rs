use std::env;

use thiserror::Error;

use crate::infrastructure::chat_notifier::{ChatCredentials, DEFAULT_CHAT_API_URL};
use crate::infrastructure::voucher_repo::TableNames;

pub const DEFAULT_TABLE_API_URL: &str = "https://api.appsheet.com/api/v2";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableApiConfig {
    pub base_url: String,
    pub app_id: String,
    pub access_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs against the in-memory table store.
    pub table_api: Option<TableApiConfig>,
    pub tables: TableNames,
    pub chat_api_url: String,
    /// `None` only logs approval messages.
    pub chat: Option<ChatCredentials>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "a port number",
                value: raw.clone(),
            })?,
            None => 8080,
        };

        let table_api = match (get("TABLE_APP_ID"), get("TABLE_ACCESS_KEY")) {
            (Some(app_id), Some(access_key)) => Some(TableApiConfig {
                base_url: get("TABLE_API_URL").unwrap_or_else(|| DEFAULT_TABLE_API_URL.to_string()),
                app_id,
                access_key,
            }),
            _ => None,
        };

        let defaults = TableNames::default();
        let tables = TableNames {
            vouchers: get("VOUCHER_TABLE").unwrap_or(defaults.vouchers),
            lines: get("VOUCHER_LINE_TABLE").unwrap_or(defaults.lines),
        };

        let chat = match (get("CHAT_BOT_TOKEN"), get("CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(ChatCredentials { bot_token, chat_id }),
            _ => None,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            table_api,
            tables,
            chat_api_url: get("CHAT_API_URL").unwrap_or_else(|| DEFAULT_CHAT_API_URL.to_string()),
            chat,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_run_in_memory_without_chat() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert!(cfg.table_api.is_none());
        assert!(cfg.chat.is_none());
        assert_eq!(cfg.tables, TableNames::default());
    }

    #[test]
    fn remote_tables_need_both_app_id_and_key() {
        assert!(config(&[("TABLE_APP_ID", "app")]).unwrap().table_api.is_none());

        let cfg = config(&[("TABLE_APP_ID", "app"), ("TABLE_ACCESS_KEY", "k"), ("VOUCHER_TABLE", "PHIEU")]).unwrap();
        let api = cfg.table_api.unwrap();
        assert_eq!(api.base_url, DEFAULT_TABLE_API_URL);
        assert_eq!(api.app_id, "app");
        assert_eq!(cfg.tables.vouchers, "PHIEU");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("CHAT_BOT_TOKEN", "t"), ("CHAT_ID", "  ")]).unwrap();
        assert!(cfg.chat.is_none());
    }

    #[test]
    fn invalid_port_is_reported() {
        assert_eq!(
            config(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid {
                name: "PORT",
                expected: "a port number",
                value: "eighty".to_string(),
            })
        );
    }
}
