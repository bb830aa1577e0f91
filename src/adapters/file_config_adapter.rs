//! INI file configuration adapter.
//!
//! Section and key names are case-insensitive; values keep their case.

use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| TraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        tracing::debug!(file = %path.display(), "configuration loaded");
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn sections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.config.get_map_ref().keys().cloned().collect();
        names.sort();
        names
    }

    fn section_keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[strategy]
name = London Breakout
buy_logic = AND(close > london.high, close > 1.1)

[account]
account_size = 10000.0
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("London Breakout".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "buy_logic"),
            Some("AND(close > london.high, close > 1.1)".to_string())
        );
    }

    #[test]
    fn leg_lists_keep_colons() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nstop_loss = pips:20, atr:1.5\n").unwrap();
        assert_eq!(
            adapter.get_string("strategy", "stop_loss"),
            Some("pips:20, atr:1.5".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[account]\nlot_size = 1\n").unwrap();
        assert_eq!(adapter.get_string("account", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[session:x]\nshift = 2\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("session:x", "shift", 0), 2);
        assert_eq!(adapter.get_int("session:x", "missing", 42), 42);
        assert_eq!(adapter.get_int("session:x", "bad", 42), 42);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[instrument]\npip_size = 0.0001\nbad = x\n").unwrap();
        assert_eq!(adapter.get_double("instrument", "pip_size", 0.0), 0.0001);
        assert_eq!(adapter.get_double("instrument", "missing", 99.9), 99.9);
        assert_eq!(adapter.get_double("instrument", "bad", 99.9), 99.9);
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("strategy", "a", false));
        assert!(adapter.get_bool("strategy", "b", false));
        assert!(adapter.get_bool("strategy", "c", false));
        assert!(!adapter.get_bool("strategy", "d", true));
        assert!(!adapter.get_bool("strategy", "e", true));
        assert!(!adapter.get_bool("strategy", "f", true));
        assert!(adapter.get_bool("strategy", "missing", true));
    }

    #[test]
    fn sections_and_keys_are_sorted_and_case_folded() {
        let adapter = FileConfigAdapter::from_string(
            "[Strategy]\nname = x\n\n[indicator:RSI_14]\nTimeperiod = 14\nfunction = RSI\n",
        )
        .unwrap();
        assert_eq!(adapter.sections(), vec!["indicator:rsi_14", "strategy"]);
        assert_eq!(
            adapter.section_keys("indicator:RSI_14"),
            vec!["function", "timeperiod"]
        );
        assert!(adapter.section_keys("nowhere").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\ndirectory = /srv/prices\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "directory"),
            Some("/srv/prices".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(TraderError::ConfigParse { .. })));
    }
}
