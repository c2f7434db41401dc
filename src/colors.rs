//! Colour schemes mapping interval labels to line colours.

use std::path::Path;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::file_name::Interval;

pub const DEFAULT_COLOR: &str = "#000000";

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorScheme {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub colors: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorSchemes {
    #[serde(default)]
    pub schemes: IndexMap<String, ColorScheme>,
}

impl ColorSchemes {
    /// Loads the scheme file; an absent file yields no schemes.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no colour schemes, using defaults");
                Ok(ColorSchemes::default())
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }

    pub fn color_for(&self, scheme: &str, interval: &Interval) -> &str {
        self.schemes
            .get(scheme)
            .and_then(|s| s.colors.get(interval.as_str()))
            .map_or(DEFAULT_COLOR, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_scheme_colour_with_default() {
        let schemes: ColorSchemes = serde_json::from_str(
            r##"{ "schemes": { "spectrum": {
                "name": "Spectrum", "description": "rainbow",
                "colors": { "M5": "#ff0000", "M15": "#00ff00" } } } }"##,
        )
        .unwrap();
        let m5: Interval = "M5".parse().unwrap();
        let m60: Interval = "M60".parse().unwrap();
        assert_eq!(schemes.color_for("spectrum", &m5), "#ff0000");
        assert_eq!(schemes.color_for("spectrum", &m60), DEFAULT_COLOR);
        assert_eq!(schemes.color_for("mono", &m5), DEFAULT_COLOR);
    }

    #[test]
    fn absent_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let schemes = ColorSchemes::load(dir.path().join("color_schemes.json")).unwrap();
        assert!(schemes.schemes.is_empty());
    }
}
