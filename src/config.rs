use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Snippet store service endpoint
    #[serde(default = "default_store_url")]
    pub store_url: String,
    /// Ollama daemon endpoint
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    /// Model used for generation and chat
    #[serde(default = "default_model")]
    pub model: String,
    /// Result cap for semantic search
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// tracing filter directives for the log file (e.g. "recall=debug")
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_store_url() -> String {
    "http://localhost:7171".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_search_limit() -> usize {
    10
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            ollama_url: default_ollama_url(),
            model: default_model(),
            search_limit: default_search_limit(),
            log_filter: None,
        }
    }
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG_TOML)?;
        Ok(path)
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub store_url: String,
    pub ollama_url: String,
    pub model: String,
    pub search_limit: usize,
    pub log_filter: Option<String>,
}

impl ResolvedConfig {
    /// Merge config file with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        store_url_override: Option<&str>,
        ollama_url_override: Option<&str>,
        model_override: Option<&str>,
        limit_override: Option<usize>,
    ) -> Self {
        Self {
            store_url: store_url_override
                .map(str::to_string)
                .unwrap_or_else(|| file.store_url.clone()),
            ollama_url: ollama_url_override
                .map(str::to_string)
                .unwrap_or_else(|| file.ollama_url.clone()),
            model: model_override
                .map(str::to_string)
                .unwrap_or_else(|| file.model.clone()),
            search_limit: limit_override.unwrap_or(file.search_limit),
            log_filter: file.log_filter.clone(),
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recall")
        .join("config.toml")
}

/// Log file next to the config; the TUI owns the terminal, so diagnostics
/// go to disk instead of stderr.
pub fn log_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recall")
        .join("recall.log")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS, %APPDATA% on Windows
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# Recall configuration
# Run `recall --init` to regenerate this file.

# Snippet store service (persistence + embedding index)
store_url = "http://localhost:7171"

# Local Ollama daemon — powers semantic search, solution drafts, and chat
ollama_url = "http://localhost:11434"
model      = "llama3.2"

# Maximum results returned by semantic search
search_limit = 10

# Log file filter (tracing directives). Uncomment for verbose logs:
# log_filter = "recall=debug"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_parses() {
        let parsed: ConfigFile = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(parsed.store_url, "http://localhost:7171");
        assert_eq!(parsed.model, "llama3.2");
        assert_eq!(parsed.search_limit, 10);
        assert!(parsed.log_filter.is_none());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: ConfigFile = toml::from_str(r#"model = "qwen3:8b""#).unwrap();
        assert_eq!(parsed.model, "qwen3:8b");
        assert_eq!(parsed.ollama_url, "http://localhost:11434");
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let file = ConfigFile::default();
        let resolved =
            ResolvedConfig::resolve(&file, Some("http://other:9999"), None, Some("mistral"), None);
        assert_eq!(resolved.store_url, "http://other:9999");
        assert_eq!(resolved.model, "mistral");
        assert_eq!(resolved.ollama_url, file.ollama_url);
        assert_eq!(resolved.search_limit, 10);
    }
}
