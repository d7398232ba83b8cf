use crate::ai::{AIConfig, AIProvider, GenerationParams, TruncationLimits};
use crate::error::ConfigError;
use crate::orchestrator::DEFAULT_OUTPUT_DIR;
use crate::report::DEFAULT_REPORT_DIR;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "schemalens.toml";

/// API key variables, most specific first.
const API_KEY_VARS: [&str; 3] = ["SCHEMALENS_API_KEY", "LLM_API_KEY", "GEMINI_API_KEY"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: AIProvider,
    pub model: String,
    /// Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// SQLite file for cached responses; caching is off when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let ai = AIConfig::default();
        let params = GenerationParams::default();
        Self {
            provider: ai.provider,
            model: ai.model,
            api_key: None,
            temperature: params.temperature,
            max_output_tokens: params.max_output_tokens,
            timeout_secs: ai.timeout_secs,
            max_retries: ai.max_retries,
            cache_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisSettings {
    pub max_tables: usize,
    pub max_columns: usize,
    pub generate_charts: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        let limits = TruncationLimits::default();
        Self {
            max_tables: limits.max_tables,
            max_columns: limits.max_columns,
            generate_charts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub output_dir: PathBuf,
    pub report_dir: PathBuf,
    pub cleanup: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            cleanup: true,
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file, then `.env`, then the process environment.
    ///
    /// An explicit `config_path` must exist; the default `schemalens.toml` is
    /// optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match config_path {
            Some(path) => Self::read_toml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::read_toml_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        Self::load_dotenv();
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;

        info!(
            "Configuration loaded: provider={}, model={}, max_tables={}, max_columns={}",
            settings.llm.provider,
            settings.llm.model,
            settings.analysis.max_tables,
            settings.analysis.max_columns
        );
        Ok(settings)
    }

    fn load_dotenv() {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Failed to load .env file: {}", e),
        }
    }

    pub fn read_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = API_KEY_VARS.iter().find_map(|&k| get(k)) {
            self.llm.api_key = Some(key);
        }
        if let Some(provider) = get("SCHEMALENS_PROVIDER") {
            self.llm.provider = AIProvider::from_str(&provider).map_err(ConfigError::Invalid)?;
        }
        if let Some(model) = get("SCHEMALENS_MODEL") {
            self.llm.model = model;
        }
        if let Some(v) = get("SCHEMALENS_TEMPERATURE") {
            self.llm.temperature = parse_var("SCHEMALENS_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("SCHEMALENS_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = parse_var("SCHEMALENS_MAX_OUTPUT_TOKENS", &v)?;
        }
        if let Some(v) = get("SCHEMALENS_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_var("SCHEMALENS_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("SCHEMALENS_MAX_RETRIES") {
            self.llm.max_retries = parse_var("SCHEMALENS_MAX_RETRIES", &v)?;
        }
        if let Some(path) = get("SCHEMALENS_CACHE_PATH") {
            self.llm.cache_path = Some(PathBuf::from(path));
        }
        if let Some(v) = get("SCHEMALENS_MAX_TABLES") {
            self.analysis.max_tables = parse_var("SCHEMALENS_MAX_TABLES", &v)?;
        }
        if let Some(v) = get("SCHEMALENS_MAX_COLUMNS") {
            self.analysis.max_columns = parse_var("SCHEMALENS_MAX_COLUMNS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }
        if self.analysis.max_tables == 0 || self.analysis.max_columns == 0 {
            return Err(ConfigError::Invalid(
                "max_tables and max_columns must be at least 1".into(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        Ok(())
    }

    pub fn ai_config(&self) -> AIConfig {
        AIConfig {
            provider: self.llm.provider,
            api_key: self.llm.api_key.clone().unwrap_or_default(),
            model: self.llm.model.clone(),
            timeout_secs: self.llm.timeout_secs,
            max_retries: self.llm.max_retries,
        }
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.llm.temperature,
            max_output_tokens: self.llm.max_output_tokens,
        }
    }

    pub fn truncation_limits(&self) -> TruncationLimits {
        TruncationLimits {
            max_tables: self.analysis.max_tables,
            max_columns: self.analysis.max_columns,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has an invalid value '{}'", key, value)))
}
