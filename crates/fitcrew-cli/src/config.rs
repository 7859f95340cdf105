//! Configuration file management for fitcrew.
//!
//! Provides a TOML-based config file at `~/.config/fitcrew/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use fitcrew_core::agents::{CrewConfig, DEFAULT_MAX_TOOL_ITERATIONS, DEFAULT_TEMPERATURE, RoleModels};
use fitcrew_core::knowledge::KnowledgeBase;
use fitcrew_core::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use fitcrew_core::llm::{OpenAiClient, OpenAiConfig};
use fitcrew_core::orchestrator::{ExecutionMode, OrchestratorConfig};
use fitcrew_core::pipeline::{DEFAULT_TIMEOUT, Pipeline, PipelineConfig};

pub const ENV_BASE_URL: &str = "FITCREW_LLM_BASE_URL";
pub const ENV_MODEL: &str = "FITCREW_LLM_MODEL";
pub const ENV_API_KEY: &str = "FITCREW_LLM_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "FITCREW_TIMEOUT_SECS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Bearer token for the model endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Wall-clock limit per plan, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_iterations: Option<usize>,
    /// `concurrent` or `sequential`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Replacement body-assessment table (TOML).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_file: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the fitcrew config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/fitcrew` or `~/.config/fitcrew`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("fitcrew");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("fitcrew")
}

/// Return the path to the fitcrew config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The file may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub mode: Option<ExecutionMode>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct FitcrewConfig {
    pub llm: OpenAiConfig,
    pub temperature: Option<f32>,
    pub timeout: Duration,
    pub max_tool_iterations: usize,
    pub mode: ExecutionMode,
    pub knowledge_file: Option<PathBuf>,
}

impl FitcrewConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        Self::resolve_with(cli, load_config().ok(), |key| std::env::var(key).ok())
    }

    /// Same chain with the config file and environment supplied by the caller.
    ///
    /// - Base URL: `--base-url` > `FITCREW_LLM_BASE_URL` > `llm.base_url` > OpenAI
    /// - Model: `--model` > `FITCREW_LLM_MODEL` > `llm.model` > `gpt-4o`
    /// - API key: `FITCREW_LLM_API_KEY` > `OPENAI_API_KEY` > `llm.api_key` > none
    /// - Timeout: `--timeout` > `FITCREW_TIMEOUT_SECS` > `pipeline.timeout_secs` > 240
    pub fn resolve_with(
        cli: &CliOverrides,
        file: Option<ConfigFile>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file = file.unwrap_or_default();
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let base_url = cli
            .base_url
            .clone()
            .or_else(|| var(ENV_BASE_URL))
            .or(file.llm.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = cli
            .model
            .clone()
            .or_else(|| var(ENV_MODEL))
            .or(file.llm.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_key = var(ENV_API_KEY)
            .or_else(|| var(ENV_OPENAI_API_KEY))
            .or(file.llm.api_key);

        let timeout_secs = match cli.timeout_secs {
            Some(secs) => secs,
            None => match var(ENV_TIMEOUT_SECS) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{ENV_TIMEOUT_SECS} is not a number: {raw}"))?,
                None => file
                    .pipeline
                    .timeout_secs
                    .unwrap_or(DEFAULT_TIMEOUT.as_secs()),
            },
        };
        if timeout_secs == 0 {
            bail!("timeout must be at least one second");
        }

        let mode = match (cli.mode, file.pipeline.mode.as_deref()) {
            (Some(mode), _) => mode,
            (None, Some(raw)) => raw
                .parse::<ExecutionMode>()
                .map_err(anyhow::Error::msg)
                .context("invalid pipeline.mode in config file")?,
            (None, None) => ExecutionMode::default(),
        };

        let llm = OpenAiConfig {
            base_url,
            api_key,
            model,
            ..OpenAiConfig::default()
        };

        Ok(Self {
            llm,
            temperature: Some(file.llm.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            timeout: Duration::from_secs(timeout_secs),
            max_tool_iterations: file
                .pipeline
                .max_tool_iterations
                .unwrap_or(DEFAULT_MAX_TOOL_ITERATIONS),
            mode,
            knowledge_file: file.pipeline.knowledge_file,
        })
    }

    /// The body-assessment table: the configured file or the embedded one.
    pub fn knowledge(&self) -> Result<KnowledgeBase> {
        match &self.knowledge_file {
            Some(path) => KnowledgeBase::load(path)
                .with_context(|| format!("failed to load knowledge file {}", path.display())),
            None => KnowledgeBase::embedded().context("embedded knowledge table is invalid"),
        }
    }

    /// Build a pipeline backed by the configured model endpoint.
    pub fn pipeline(&self) -> Result<Pipeline> {
        if self.llm.api_key.is_none() {
            tracing::warn!(
                base_url = %self.llm.base_url,
                "no API key configured; requests will be sent without credentials"
            );
        }
        let client = OpenAiClient::new(self.llm.clone()).context("failed to build model client")?;
        let mut crew = CrewConfig::new(RoleModels::uniform(Arc::new(client)), Arc::new(self.knowledge()?));
        crew.max_tool_iterations = self.max_tool_iterations;
        crew.temperature = self.temperature;

        let config = PipelineConfig {
            crew,
            orchestrator: OrchestratorConfig { mode: self.mode },
            timeout: self.timeout,
        };
        Pipeline::new(config).context("invalid task graph")
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn file_with_model(model: &str) -> ConfigFile {
        ConfigFile {
            llm: LlmSection {
                model: Some(model.to_string()),
                api_key: Some("sk-file".to_string()),
                ..LlmSection::default()
            },
            pipeline: PipelineSection {
                timeout_secs: Some(90),
                mode: Some("sequential".to_string()),
                ..PipelineSection::default()
            },
        }
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = FitcrewConfig::resolve_with(&CliOverrides::default(), None, env_of(&[])).unwrap();
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_tool_iterations, DEFAULT_MAX_TOOL_ITERATIONS);
        assert_eq!(config.mode, ExecutionMode::Concurrent);
        assert_eq!(config.temperature, Some(DEFAULT_TEMPERATURE));
    }

    #[test]
    fn file_values_apply() {
        let config = FitcrewConfig::resolve_with(
            &CliOverrides::default(),
            Some(file_with_model("gpt-4o-mini")),
            env_of(&[]),
        )
        .unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-file"));
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert_eq!(config.mode, ExecutionMode::Sequential);
    }

    #[test]
    fn env_overrides_config_file() {
        let config = FitcrewConfig::resolve_with(
            &CliOverrides::default(),
            Some(file_with_model("gpt-4o-mini")),
            env_of(&[
                (ENV_MODEL, "llama3"),
                (ENV_OPENAI_API_KEY, "sk-openai"),
                (ENV_TIMEOUT_SECS, "30"),
            ]),
        )
        .unwrap();
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn fitcrew_key_wins_over_openai_key() {
        let config = FitcrewConfig::resolve_with(
            &CliOverrides::default(),
            None,
            env_of(&[(ENV_API_KEY, "sk-fitcrew"), (ENV_OPENAI_API_KEY, "sk-openai")]),
        )
        .unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-fitcrew"));
    }

    #[test]
    fn cli_flag_overrides_all() {
        let cli = CliOverrides {
            base_url: Some("http://localhost:11434/v1".to_string()),
            model: Some("qwen2.5".to_string()),
            timeout_secs: Some(15),
            mode: Some(ExecutionMode::Concurrent),
        };
        let config = FitcrewConfig::resolve_with(
            &cli,
            Some(file_with_model("gpt-4o-mini")),
            env_of(&[(ENV_BASE_URL, "http://env/v1"), (ENV_MODEL, "llama3")]),
        )
        .unwrap();
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.model, "qwen2.5");
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.mode, ExecutionMode::Concurrent);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = FitcrewConfig::resolve_with(
            &CliOverrides::default(),
            None,
            env_of(&[(ENV_MODEL, "  "), (ENV_API_KEY, "")]),
        )
        .unwrap();
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn bad_timeout_env_is_an_error() {
        let err = FitcrewConfig::resolve_with(
            &CliOverrides::default(),
            None,
            env_of(&[(ENV_TIMEOUT_SECS, "soon")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT_SECS));

        let zero = CliOverrides {
            timeout_secs: Some(0),
            ..CliOverrides::default()
        };
        assert!(FitcrewConfig::resolve_with(&zero, None, env_of(&[])).is_err());
    }

    #[test]
    fn bad_mode_in_file_is_an_error() {
        let mut file = ConfigFile::default();
        file.pipeline.mode = Some("parallel".to_string());
        let err = FitcrewConfig::resolve_with(&CliOverrides::default(), Some(file), env_of(&[]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("unknown execution mode 'parallel'"));
    }

    #[test]
    fn knowledge_defaults_to_embedded_table() {
        let config = FitcrewConfig::resolve_with(&CliOverrides::default(), None, env_of(&[])).unwrap();
        assert!(!config.knowledge().unwrap().is_empty());
    }

    #[test]
    fn missing_knowledge_file_is_an_error() {
        let mut file = ConfigFile::default();
        file.pipeline.knowledge_file = Some(PathBuf::from("/nonexistent/body.toml"));
        let config = FitcrewConfig::resolve_with(&CliOverrides::default(), Some(file), env_of(&[])).unwrap();
        let err = config.knowledge().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/body.toml"));
    }

    #[test]
    fn config_file_roundtrip_skips_unset_keys() {
        let original = file_with_model("gpt-4o-mini");
        let text = toml::to_string_pretty(&original).unwrap();
        assert!(!text.contains("base_url"));
        let loaded: ConfigFile = toml::from_str(&text).unwrap();
        assert_eq!(loaded.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(loaded.pipeline.timeout_secs, Some(90));

        let empty: ConfigFile = toml::from_str("").unwrap();
        assert!(empty.llm.model.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_writes_owner_only_file() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let result = save_config(&file_with_model("gpt-4o"));
        let path = config_path();
        let loaded = load_config();

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        result.unwrap();
        assert!(path.starts_with(tmp.path()));
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        assert_eq!(loaded.unwrap().llm.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let _lock = lock_env();
        let path = config_path();
        assert!(
            path.ends_with("fitcrew/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
