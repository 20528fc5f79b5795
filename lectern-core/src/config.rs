use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LecternConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Mirror log output to `~/.config/lectern/lectern.log`
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dictionary_timeout")]
    pub timeout_secs: u64,
    /// Override for the dictionary endpoint, mostly useful for local mirrors
    #[serde(default)]
    pub base_url: Option<String>,
}

const fn default_true() -> bool {
    true
}

const fn default_dictionary_timeout() -> u64 {
    10
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_dictionary_timeout(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfConfig {
    /// Directory holding the pdfium shared library. Empty means "use the system library".
    #[serde(default)]
    pub library_dir: String,
}

impl PdfConfig {
    #[must_use]
    pub fn library_dir(&self) -> Option<PathBuf> {
        let trimmed = self.library_dir.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Whether the chapter list is visible for a fresh import
    #[serde(default = "default_true")]
    pub show_chapters: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            show_chapters: true,
        }
    }
}

impl LecternConfig {
    /// Get the configuration directory path (~/.config/lectern/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/lectern/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location, or write a template on first run.
    ///
    /// `extra_templates` are appended to the base template so that other crates
    /// can document their own sections.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after creating the template, or an error
    /// if the file cannot be read or parsed.
    pub fn load_or_create(extra_templates: Option<&[&str]>) -> Result<Self> {
        Self::load_or_create_at(&Self::config_path(), extra_templates)
    }

    /// Same as [`Self::load_or_create`] for an explicit path.
    ///
    /// # Errors
    ///
    /// See [`Self::load_or_create`].
    pub fn load_or_create_at(path: &Path, extra_templates: Option<&[&str]>) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(path, build_config_template(extra_templates.unwrap_or_default()))?;

            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.dictionary.timeout_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "dictionary.timeout_secs must be greater than zero".into(),
            });
        }
        if let Some(url) = &self.dictionary.base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(CoreError::ConfigInvalid {
                message: format!("dictionary.base_url {url:?} must be an http(s) URL"),
            });
        }
        if let Some(dir) = self.pdf.library_dir()
            && !dir.is_dir()
        {
            return Err(CoreError::ConfigInvalid {
                message: format!("pdf.library_dir {} is not a directory", dir.display()),
            });
        }
        Ok(())
    }
}

/// Build the full config template from the base template plus provider sections.
#[must_use]
pub fn build_config_template(extra_templates: &[&str]) -> String {
    let mut template = String::from(CONFIG_TEMPLATE);
    for extra in extra_templates {
        template.push('\n');
        template.push_str(extra);
    }
    template
}

const CONFIG_TEMPLATE: &str = r#"# Lectern Configuration
# ~/.config/lectern/config.toml

[logging]
# Also write logs to ~/.config/lectern/lectern.log
enabled = false

[pdf]
# Directory containing the pdfium shared library; leave empty to use the system library
library_dir = ""

[reader]
# Show the chapter list after importing a document
show_chapters = true
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: LecternConfig = toml::from_str("").unwrap();
        assert!(!config.logging.enabled);
        assert!(config.dictionary.enabled);
        assert_eq!(config.dictionary.timeout_secs, 10);
        assert!(config.pdf.library_dir().is_none());
        assert!(config.reader.show_chapters);
    }

    #[test]
    fn test_template_parses() {
        let template = build_config_template(&["[dictionary]\nenabled = false\n"]);
        let config: LecternConfig = toml::from_str(&template).unwrap();
        assert!(!config.dictionary.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config: LecternConfig = toml::from_str("[dictionary]\ntimeout_secs = 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(CoreError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_non_http_base_url_rejected() {
        let config: LecternConfig =
            toml::from_str("[dictionary]\nbase_url = \"ftp://example.com\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(CoreError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_load_or_create_writes_template_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let first = LecternConfig::load_or_create_at(&path, None);
        assert!(matches!(first, Err(CoreError::ConfigNotFound { .. })));
        assert!(path.exists());

        let second = LecternConfig::load_or_create_at(&path, None).unwrap();
        assert!(second.reader.show_chapters);
    }

    #[test]
    fn test_parse_error_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[reader\nshow_chapters = ").unwrap();

        let result = LecternConfig::load_or_create_at(&path, None);
        assert!(matches!(result, Err(CoreError::ConfigParseError(_))));
    }
}
