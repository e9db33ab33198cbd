use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub recognition: RecognitionConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Speech recognition backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// NATS URL of the speech service. Unset means no real backend is
    /// configured and sessions fall back to the simulated recognizer
    /// (if allowed).
    pub nats_url: Option<String>,

    /// Sample rate the speech service expects (16kHz PCM)
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono)
    pub channels: u16,

    /// Language used when the client's `ready` does not name one
    pub default_language: String,

    /// Whether sessions may fall back to the deterministic simulated
    /// recognizer when the real backend is unavailable
    pub allow_simulation: bool,

    /// Timeout for establishing the backend connection
    pub connect_timeout_ms: u64,

    /// Settle window between `stop` and stream teardown, so already-sent
    /// audio can finish round-tripping
    pub stop_settle_ms: u64,
}

/// Entity extraction backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// HTTP endpoint of the entity extraction service. Unset means the
    /// built-in lexicon extractor is used.
    pub endpoint: Option<String>,

    /// Timeout for a single extraction call
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "scribe-gateway".to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            nats_url: None,
            sample_rate: 16000,
            channels: 1,
            default_language: "en-US".to_string(),
            allow_simulation: true,
            connect_timeout_ms: 3000,
            stop_settle_ms: 500,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus `SCRIBE_GATEWAY_*`
    /// environment overrides. Missing file falls back to defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SCRIBE_GATEWAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
