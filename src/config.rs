use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// File looked up in the vault root when no `--config` is given
pub const VAULT_CONFIG_FILE: &str = ".vaultlink.yaml";

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_RATING_MODEL: &str = "llama3";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RATING_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// One retry after the first failure
const DEFAULT_MAX_ATTEMPTS: u32 = 2;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;
const DEFAULT_JITTER_MS: u64 = 250;

const DEFAULT_MAX_RELATED: usize = 3;
const DEFAULT_MIN_SCORE: f32 = 0.7;
const DEFAULT_MAX_INPUT_CHARS: usize = 8_000;

/// Where the model server lives and which models to ask.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for `/api/embeddings`
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Model used for `/api/generate` when rating notes
    #[serde(default = "default_rating_model")]
    pub rating_model: String,

    /// Request timeout for embedding calls, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Request timeout for rating calls, in seconds
    #[serde(default = "default_rating_timeout_secs")]
    pub rating_timeout_secs: u64,

    /// Provider requests allowed in flight at once
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            rating_model: default_rating_model(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            rating_timeout_secs: DEFAULT_RATING_TIMEOUT_SECS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per provider call, first call included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            jitter_ms: DEFAULT_JITTER_MS,
        }
    }
}

/// Related-notes selection policy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LinkerConfig {
    /// Upper bound of links written per note
    #[serde(default = "default_max_related")]
    pub max_related: usize,

    /// Minimum cosine similarity [-1.0, 1.0]
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Embed `title + body` instead of the body alone
    #[serde(default)]
    pub include_title: bool,

    /// Append the similarity score to every link
    #[serde(default)]
    pub show_scores: bool,

    /// Embedding input is cut to this many characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Leave out notes the body already links with `[[...]]`
    #[serde(default = "default_skip_existing_links")]
    pub skip_existing_links: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            max_related: DEFAULT_MAX_RELATED,
            min_score: DEFAULT_MIN_SCORE,
            include_title: false,
            show_scores: false,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            skip_existing_links: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QualityConfig {
    /// Ask the server for JSON output (`"format": "json"`)
    #[serde(default = "default_json_mode")]
    pub json_mode: bool,

    /// Rating input is cut to this many characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            json_mode: true,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct VaultConfig {
    /// Regexes matched against vault-relative note paths; matches are ignored
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_rating_model() -> String {
    DEFAULT_RATING_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_rating_timeout_secs() -> u64 {
    DEFAULT_RATING_TIMEOUT_SECS
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

fn default_jitter_ms() -> u64 {
    DEFAULT_JITTER_MS
}

fn default_max_related() -> usize {
    DEFAULT_MAX_RELATED
}

fn default_min_score() -> f32 {
    DEFAULT_MIN_SCORE
}

fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

fn default_skip_existing_links() -> bool {
    true
}

fn default_json_mode() -> bool {
    true
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub linker: LinkerConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub vault: VaultConfig,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let provider = &self.provider;
        let url = url::Url::parse(&provider.base_url)
            .with_context(|| format!("provider.base_url is not a valid url: {:?}", provider.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("provider.base_url must be http or https, got {:?}", provider.base_url);
        }
        if provider.embedding_model.trim().is_empty() {
            bail!("provider.embedding_model must not be empty");
        }
        if provider.rating_model.trim().is_empty() {
            bail!("provider.rating_model must not be empty");
        }
        if provider.timeout_secs == 0 || provider.rating_timeout_secs == 0 {
            bail!("provider timeouts must be greater than 0");
        }
        if provider.max_in_flight == 0 {
            bail!("provider.max_in_flight must be a positive integer");
        }

        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            bail!("retry.initial_backoff_ms must not exceed retry.max_backoff_ms");
        }

        let linker = &self.linker;
        if !(-1.0..=1.0).contains(&linker.min_score) {
            bail!(
                "linker.min_score must be between -1.0 and 1.0, got {}",
                linker.min_score
            );
        }
        if linker.max_input_chars == 0 || self.quality.max_input_chars == 0 {
            bail!("max_input_chars must be greater than 0");
        }

        for pattern in &self.vault.exclude {
            regex::Regex::new(pattern)
                .with_context(|| format!("vault.exclude has an invalid pattern: {pattern:?}"))?;
        }

        Ok(())
    }

    /// Parse a YAML config. Missing fields take their defaults.
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yml::from_str(text).context("config is malformed")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else `<vault>/.vaultlink.yaml` when a
    /// vault is known and the file exists, else the defaults.
    pub fn load(explicit: Option<&Path>, vault_root: Option<&Path>) -> anyhow::Result<Self> {
        let path: Option<PathBuf> = match (explicit, vault_root) {
            (Some(path), _) => Some(path.to_path_buf()),
            (None, Some(root)) => {
                let candidate = root.join(VAULT_CONFIG_FILE);
                candidate.is_file().then_some(candidate)
            }
            (None, None) => None,
        };

        match path {
            Some(path) => {
                log::debug!("loading config from {}", path.display());
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_yaml(&text).with_context(|| format!("in {}", path.display()))
            }
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yml::to_string(self)?)
    }
}
