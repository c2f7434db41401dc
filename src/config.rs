//! Application configuration document.
//!
//! One [`AppConfig`] is loaded at process start and handed to every
//! component by reference. Each field has a default so partial documents load.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Column names the transformer cannot work without.
pub const REQUIRED_COLUMNS: [&str; 6] = ["DATE", "TIME", "OPEN", "HIGH", "LOW", "CLOSE"];

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Field delimiter, escape-encoded (`"\\t"` for a tab).
    pub delimiter: String,
    /// Ordered column names; the first CSV row is always skipped.
    pub columns: Vec<String>,
    /// strftime pattern for the merged `"<DATE> <TIME>"` string.
    pub date_format: String,
    pub color_scheme: String,
    pub cache_dir: PathBuf,
    pub metadata_path: PathBuf,
    pub metaplot_path: PathBuf,
    pub plot_dir: PathBuf,
    pub color_schemes_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            delimiter: "\\t".to_string(),
            columns: [
                "DATE", "TIME", "OPEN", "HIGH", "LOW", "CLOSE", "TICKVOL", "VOL", "SPREAD",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            date_format: "%Y.%m.%d %H:%M:%S".to_string(),
            color_scheme: "spectrum".to_string(),
            cache_dir: PathBuf::from("cache"),
            metadata_path: PathBuf::from("metadata.json"),
            metaplot_path: PathBuf::from("metaplot.json"),
            plot_dir: PathBuf::from("plots"),
            color_schemes_path: PathBuf::from("resources/color_schemes.json"),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let config: AppConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config, writing the default document first if none exists.
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let config = AppConfig::default();
            config.save(path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            return Ok(config);
        }
        Self::load(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, data).map_err(|e| Error::io(path, e))
    }

    /// Rebases every relative path onto `root`.
    pub fn rooted_at<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        for path in [
            &mut self.cache_dir,
            &mut self.metadata_path,
            &mut self.metaplot_path,
            &mut self.plot_dir,
            &mut self.color_schemes_path,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.delimiter_byte()?;
        for required in REQUIRED_COLUMNS {
            self.column_position(required)?;
        }
        if self.date_format.trim().is_empty() {
            return Err(Error::Config("date_format must not be empty".to_string()));
        }
        Ok(())
    }

    /// The decoded delimiter as the single byte the CSV reader needs.
    pub fn delimiter_byte(&self) -> Result<u8> {
        let decoded = decode_escapes(&self.delimiter)?;
        match decoded.as_bytes() {
            [b] => Ok(*b),
            _ => Err(Error::Config(format!(
                "delimiter `{}` must decode to exactly one byte",
                self.delimiter
            ))),
        }
    }

    pub fn column_position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    pub fn optional_column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Decodes backslash escapes such as `\t` or `\x3b`.
pub fn decode_escapes(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let byte = u8::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 2)
                    .ok_or_else(|| Error::Config(format!("invalid escape `\\x{hex}`")))?;
                out.push(char::from(byte));
            }
            Some(other) => {
                return Err(Error::Config(format!("unsupported escape `\\{other}`")));
            }
            None => return Err(Error::Config("dangling `\\` in delimiter".to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_common_escapes() {
        assert_eq!(decode_escapes("\\t").unwrap(), "\t");
        assert_eq!(decode_escapes(";").unwrap(), ";");
        assert_eq!(decode_escapes("\\x2c").unwrap(), ",");
        assert_eq!(decode_escapes("a\\\\b").unwrap(), "a\\b");
        assert!(decode_escapes("\\q").is_err());
        assert!(decode_escapes("\\").is_err());
        assert!(decode_escapes("\\x2").is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.delimiter_byte().unwrap(), b'\t');
        assert_eq!(config.column_position("CLOSE").unwrap(), 5);
    }

    #[test]
    fn multi_byte_delimiter_is_rejected() {
        let config = AppConfig {
            delimiter: ";;".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(config.delimiter_byte(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let config = AppConfig {
            columns: vec!["DATE".into(), "TIME".into(), "OPEN".into()],
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::MissingColumn(c)) if c == "HIGH"));
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "delimiter": ",", "date_format": "%Y-%m-%d %H:%M" }"#)
                .unwrap();
        assert_eq!(config.delimiter_byte().unwrap(), b',');
        assert_eq!(config.columns.len(), 9);
        assert_eq!(config.cache_dir, PathBuf::from("cache"));
    }

    #[test]
    fn load_or_init_writes_default_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("config.json");
        let first = AppConfig::load_or_init(&path).unwrap();
        assert!(path.exists());
        let second = AppConfig::load_or_init(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rooted_at_keeps_absolute_paths() {
        let config = AppConfig {
            plot_dir: PathBuf::from("/abs/plots"),
            ..AppConfig::default()
        }
        .rooted_at("/work");
        assert_eq!(config.cache_dir, PathBuf::from("/work/cache"));
        assert_eq!(config.plot_dir, PathBuf::from("/abs/plots"));
    }
}
