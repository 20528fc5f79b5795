use async_trait::async_trait;
use const_format::concatcp;
use lectern_core::dictionary::{DefinitionProvider, Sense};
use lectern_core::{CoreError, DictionaryConfig, LookupError};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lectern::provider::dictionaryapi";

/// Provider name used in logs
pub const PROVIDER_NAME: &str = "dictionaryapi";

/// English entries endpoint; the word is appended as the last path segment
pub const DEFAULT_API_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en";

/// Default timeout for HTTP requests (10 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Config template for the dictionary section.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"[dictionary]
# Look up words with dictionaryapi.dev
enabled = true
# Give up on a lookup after this many seconds
timeout_secs = "#,
    DEFAULT_TIMEOUT_SECS,
    r#"
# Optional: alternative endpoint serving the same format
# base_url = ""#,
    DEFAULT_API_URL,
    "\"\n"
);

/// dictionaryapi.dev definition provider
pub struct DictionaryApiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl DictionaryApiProvider {
    /// Create a provider for the public endpoint with the default 10-second timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        Self::with_base_url(DEFAULT_API_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider from the `[dictionary]` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &DictionaryConfig) -> Result<Self, CoreError> {
        Self::with_base_url(
            config.base_url.as_deref().unwrap_or(DEFAULT_API_URL),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Create a provider for an endpoint serving the dictionaryapi.dev format.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .user_agent("Lectern/1.0 (https://github.com/kvnxiao/lectern)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn entry_url(&self, word: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(word))
    }
}

#[derive(Debug, Deserialize)]
struct ApiEntry {
    #[serde(default)]
    meanings: Vec<ApiMeaning>,
}

#[derive(Debug, Deserialize)]
struct ApiMeaning {
    #[serde(rename = "partOfSpeech")]
    part_of_speech: Option<String>,
    #[serde(default)]
    definitions: Vec<ApiDefinition>,
}

#[derive(Debug, Deserialize)]
struct ApiDefinition {
    definition: String,
}

fn parse_entries(body: &str) -> Result<Vec<Sense>, LookupError> {
    let entries: Vec<ApiEntry> =
        serde_json::from_str(body).map_err(|e| LookupError::Parse(e.to_string()))?;

    Ok(entries
        .into_iter()
        .flat_map(|entry| entry.meanings)
        .map(|meaning| Sense {
            part_of_speech: meaning.part_of_speech,
            definitions: meaning
                .definitions
                .into_iter()
                .map(|d| d.definition)
                .collect(),
        })
        .collect())
}

#[async_trait]
impl DefinitionProvider for DictionaryApiProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn senses(&self, word: &str) -> Result<Vec<Sense>, LookupError> {
        let url = self.entry_url(word);
        info!(target: LOG_TARGET, "GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        let status = response.status();
        debug!(target: LOG_TARGET, "Response status: {}", status);

        if status == reqwest::StatusCode::NOT_FOUND {
            info!(target: LOG_TARGET, "No entry for {:?}", word);
            return Ok(Vec::new());
        }

        if !status.is_success() {
            warn!(target: LOG_TARGET, "Dictionary returned status: {}", status);
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        let senses = parse_entries(&body)?;
        debug!(
            target: LOG_TARGET,
            "Found {} sense(s) for {:?}",
            senses.len(),
            word
        );
        Ok(senses)
    }
}
