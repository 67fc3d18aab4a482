use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use color_eyre::{eyre::eyre, Result};
use derive_deref::{Deref, DerefMut};
use directories::BaseDirs;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::core::{CsvImportOptions, DataSource};
use crate::tui::{theme::ThemeName, Action, KeyBindings, Theme};

const CONFIG: &str = include_str!("../.config/config.json5");

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref DATA_FOLDER: Option<PathBuf> =
        env::var(format!("{}_DATA", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
}

/// Width overrides keyed by field name
#[derive(Clone, Debug, Default, PartialEq, Eq, Deref, DerefMut, Serialize, Deserialize)]
pub struct ColumnWidths(pub HashMap<String, u16>);

fn default_source() -> String {
    DataSource::default().to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_quote() -> String {
    "\"".to_string()
}

fn default_filter_debounce_ms() -> u64 {
    300
}

fn default_busy_min_ms() -> u64 {
    500
}

fn default_view_settle_ms() -> u64 {
    500
}

fn default_pivot_debounce_ms() -> u64 {
    300
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub config_dir: PathBuf,
    /// CSV path or http(s) URL
    #[serde(default = "default_source")]
    pub source: String,
    /// Field separator, a single ASCII character
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_quote")]
    pub quote: String,
    #[serde(default)]
    pub column_widths: ColumnWidths,
    #[serde(default = "default_filter_debounce_ms")]
    pub filter_debounce_ms: u64,
    #[serde(default = "default_busy_min_ms")]
    pub busy_min_ms: u64,
    #[serde(default = "default_view_settle_ms")]
    pub view_settle_ms: u64,
    #[serde(default = "default_pivot_debounce_ms")]
    pub pivot_debounce_ms: u64,
    #[serde(default)]
    pub theme: ThemeName,
    /// Key pattern to action, layered over the built-in bindings
    #[serde(default)]
    pub keybindings: HashMap<String, Action>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            config_dir: get_config_dir(),
            source: default_source(),
            delimiter: default_delimiter(),
            quote: default_quote(),
            column_widths: ColumnWidths::default(),
            filter_debounce_ms: default_filter_debounce_ms(),
            busy_min_ms: default_busy_min_ms(),
            view_settle_ms: default_view_settle_ms(),
            pivot_debounce_ms: default_pivot_debounce_ms(),
            theme: ThemeName::default(),
            keybindings: HashMap::new(),
        }
    }
}

impl Config {
    /// Layer the embedded defaults, then the user file
    ///
    /// An explicit `config_path` must exist; the home file
    /// (`~/.fmcsa-viewer.json5`) is optional.
    pub fn from_path(config_path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5))
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?;

        builder = match config_path {
            Some(p) => builder.add_source(
                config::File::from(expand_tilde(p))
                    .format(config::FileFormat::Json5)
                    .required(true),
            ),
            None => builder.add_source(
                config::File::from(default_home_config_path())
                    .format(config::FileFormat::Json5)
                    .required(false),
            ),
        };

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.csv_options().map_err(config::ConfigError::Message)?;
        Ok(settings)
    }

    pub fn data_source(&self) -> Result<DataSource> {
        let source = self.source.trim();
        match source.strip_prefix('~') {
            Some(_) => Ok(DataSource::File(expand_tilde(Path::new(source)))),
            None => DataSource::from_str(source).map_err(|e| eyre!(e)),
        }
    }

    /// Reader settings from `delimiter` and `quote`
    pub fn csv_options(&self) -> Result<CsvImportOptions, String> {
        Ok(CsvImportOptions {
            delimiter: single_byte("delimiter", &self.delimiter)?,
            quote_char: single_byte("quote", &self.quote)?,
        })
    }

    pub fn filter_debounce(&self) -> Duration {
        Duration::from_millis(self.filter_debounce_ms)
    }

    pub fn busy_min(&self) -> Duration {
        Duration::from_millis(self.busy_min_ms)
    }

    pub fn view_settle(&self) -> Duration {
        Duration::from_millis(self.view_settle_ms)
    }

    pub fn pivot_debounce(&self) -> Duration {
        Duration::from_millis(self.pivot_debounce_ms)
    }

    pub fn theme(&self) -> Theme {
        Theme::from_name(self.theme)
    }

    /// Built-in bindings with the configured overrides applied
    pub fn keybindings(&self) -> KeyBindings {
        KeyBindings::default().with_overrides(&self.keybindings)
    }
}

fn single_byte(key: &str, value: &str) -> Result<u8, String> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("{} must be a single ASCII character, got {:?}", key, value)),
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if s.starts_with('~') {
            if let Some(base) = BaseDirs::new() {
                return PathBuf::from(s.replacen('~', base.home_dir().to_str().unwrap_or(""), 1));
            }
        }
    }
    path.to_path_buf()
}

fn default_home_config_path() -> PathBuf {
    let file = format!(".{}.json5", env!("CARGO_PKG_NAME"));
    if let Some(base) = BaseDirs::new() {
        return base.home_dir().join(file);
    }
    PathBuf::from(file)
}

pub fn get_data_dir() -> PathBuf {
    if let Some(s) = DATA_FOLDER.clone() {
        s
    } else {
        PathBuf::from(".").join(".data")
    }
}

pub fn get_config_dir() -> PathBuf {
    if let Some(s) = CONFIG_FOLDER.clone() {
        s
    } else {
        PathBuf::from(".").join(".config")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json5").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let cfg: Config = json5::from_str(CONFIG).unwrap();
        assert_eq!(cfg.source, "data/FMSCA.csv");
        assert_eq!(cfg.filter_debounce(), Duration::from_millis(300));
        assert_eq!(cfg.busy_min(), Duration::from_millis(500));
        assert_eq!(cfg.view_settle(), Duration::from_millis(500));
        assert_eq!(cfg.theme, ThemeName::Dark);
        assert!(cfg.keybindings.is_empty());
        let options = cfg.csv_options().unwrap();
        assert_eq!((options.delimiter, options.quote_char), (b',', b'"'));
    }

    #[test]
    fn test_csv_settings_from_user_file() {
        let file = write_config(r#"{ delimiter: ";", quote: "'" }"#);
        let cfg = Config::from_path(Some(file.path())).unwrap();
        let options = cfg.csv_options().unwrap();
        assert_eq!(options.delimiter, b';');
        assert_eq!(options.quote_char, b'\'');
    }

    #[test]
    fn test_invalid_delimiter_rejected() {
        let file = write_config(r#"{ delimiter: ";;" }"#);
        let err = Config::from_path(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("delimiter"));

        let mut cfg = Config::default();
        cfg.quote = "é".to_string();
        assert!(cfg.csv_options().is_err());
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let file = write_config(
            r#"{
                // user overrides
                source: "https://example.com/FMSCA.csv",
                filter_debounce_ms: 150,
                theme: "light",
                column_widths: { legal_name: 50 },
                keybindings: { "ctrl+p": "ToggleView" },
            }"#,
        );
        let cfg = Config::from_path(Some(file.path())).unwrap();

        assert_eq!(
            cfg.data_source().unwrap(),
            DataSource::Url("https://example.com/FMSCA.csv".to_string())
        );
        assert_eq!(cfg.filter_debounce(), Duration::from_millis(150));
        // Untouched keys keep their defaults
        assert_eq!(cfg.view_settle_ms, 500);
        assert_eq!(cfg.theme().name, "Light");
        assert_eq!(cfg.column_widths.get("legal_name"), Some(&50));
        assert_eq!(cfg.keybindings.get("ctrl+p"), Some(&Action::ToggleView));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json5");
        assert!(Config::from_path(Some(&missing)).is_err());
    }

    #[test]
    fn test_keybinding_overrides_applied() {
        let mut cfg = Config::default();
        cfg.keybindings
            .insert("Ctrl+p".to_string(), Action::ToggleView);
        let bindings = cfg.keybindings();
        assert!(bindings
            .get_keys_for_action(Action::ToggleView)
            .iter()
            .any(|k| k == "Ctrl+p"));
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        let p = PathBuf::from("data/FMSCA.csv");
        assert_eq!(expand_tilde(&p), p);
    }

    #[test]
    fn test_default_source_is_local_file() {
        let cfg = Config::default();
        assert_eq!(cfg.data_source().unwrap(), DataSource::default());
    }
}
