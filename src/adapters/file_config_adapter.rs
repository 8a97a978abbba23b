//! INI file configuration adapter.

use crate::domain::error::StagescanError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StagescanError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| StagescanError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, StagescanError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| StagescanError::ConfigParse {
                file: "<string>".into(),
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
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
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
[postgres]
connection_string = host=localhost dbname=market

[engine]
lookback_days = 400
workers = 8

[rrg]
benchmark = NIFTY 50
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("postgres", "connection_string"),
            Some("host=localhost dbname=market".to_string())
        );
        assert_eq!(
            adapter.get_string("rrg", "benchmark"),
            Some("NIFTY 50".to_string())
        );
    }

    #[test]
    fn keys_are_case_insensitive() {
        let adapter = FileConfigAdapter::from_string("[Engine]\nLookback_Days = 250\n").unwrap();
        assert_eq!(adapter.get_int("engine", "lookback_days", 0), 250);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[engine]\nworkers = 4\n").unwrap();
        assert_eq!(adapter.get_string("engine", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value() {
        let adapter = FileConfigAdapter::from_string("[engine]\nworkers = 5\n").unwrap();
        assert_eq!(adapter.get_int("engine", "workers", 0), 5);
    }

    #[test]
    fn get_int_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[engine]\n").unwrap();
        assert_eq!(adapter.get_int("engine", "missing", 42), 42);
    }

    #[test]
    fn get_int_returns_default_for_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[engine]\nworkers = abc\n").unwrap();
        assert_eq!(adapter.get_int("engine", "workers", 42), 42);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[engine]\nbb_squeeze_threshold = 8.5\n").unwrap();
        assert_eq!(adapter.get_double("engine", "bb_squeeze_threshold", 0.0), 8.5);
    }

    #[test]
    fn get_double_returns_default_for_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[engine]\nbb_squeeze_threshold = wide\n").unwrap();
        assert_eq!(adapter.get_double("engine", "bb_squeeze_threshold", 10.0), 10.0);
    }

    #[test]
    fn get_bool_parses_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[rrg]\na = true\nb = yes\nc = 1\nd = off\ne = No\nf = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("rrg", "a", false));
        assert!(adapter.get_bool("rrg", "b", false));
        assert!(adapter.get_bool("rrg", "c", false));
        assert!(!adapter.get_bool("rrg", "d", true));
        assert!(!adapter.get_bool("rrg", "e", true));
        assert!(adapter.get_bool("rrg", "f", true));
        assert!(!adapter.get_bool("rrg", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[sqlite]\npath = /var/lib/stagescan.db\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/var/lib/stagescan.db".to_string())
        );
    }

    #[test]
    fn from_file_returns_parse_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(StagescanError::ConfigParse { .. })));
    }
}
