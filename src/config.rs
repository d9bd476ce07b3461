//! Configuration for professor.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (DATA_DIR, BASE_URL, SHARE_SECRET, ...)
//! 2. Config file (.professor/config.yaml)
//! 3. Defaults (~/.professor)
//!
//! Config file discovery:
//! - Searches current directory and parents for .professor/config.yaml
//! - Paths in config file are relative to the project root (parent of .professor/)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::share::DEFAULT_SECRET;

/// Global cached configuration (stores Result to handle init errors)
static SETTINGS: OnceLock<Result<Settings, String>> = OnceLock::new();

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_SHARE_TTL_SECONDS: u64 = 86_400;
const DEFAULT_MAX_UPLOAD_MB: u64 = 50;
const DEFAULT_TRANSCODER: &str = "ffmpeg";
const DEFAULT_TRANSCODER_TIMEOUT_SECONDS: u64 = 600;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub share: Option<ShareConfig>,
    #[serde(default)]
    pub uploads: Option<UploadConfig>,
    #[serde(default)]
    pub transcoder: Option<TranscoderConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareConfig {
    /// Externally reachable base URL
    pub base_url: Option<String>,
    pub secret: Option<String>,
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadConfig {
    /// 0 disables the limit
    pub max_upload_mb: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscoderConfig {
    pub binary: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct Settings {
    /// Data directory (meta.json, audio/, pdf/)
    pub data_dir: PathBuf,
    /// Externally reachable base URL for share links
    pub base_url: String,
    /// HMAC secret for share links
    pub share_secret: String,
    /// How long a share link stays valid
    pub share_ttl: Duration,
    /// Upload limit in bytes (0 = unlimited)
    pub max_upload_bytes: u64,
    /// Transcoder binary name or path
    pub transcoder_binary: String,
    /// Per-invocation transcoder timeout
    pub transcoder_timeout: Duration,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Settings {
    /// Whether share links are signed with the built-in secret
    pub fn uses_default_secret(&self) -> bool {
        self.share_secret == DEFAULT_SECRET
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".professor").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Parse an integer environment variable, naming it in the error
fn parse_u64(env: &HashMap<String, String>, key: &str) -> Result<Option<u64>> {
    match env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .with_context(|| format!("Failed to parse {}: {:?}", key, value)),
        None => Ok(None),
    }
}

fn non_empty(env: &HashMap<String, String>, key: &str) -> Option<String> {
    env.get(key).filter(|v| !v.trim().is_empty()).cloned()
}

/// Merge the three sources. Pure, so it can be tested without touching the
/// process environment.
pub fn resolve(
    file: Option<(&Path, ConfigFile)>,
    env: &HashMap<String, String>,
    default_data_dir: PathBuf,
) -> Result<Settings> {
    let (config_file, config) = match file {
        Some((path, config)) => (Some(path.to_path_buf()), config),
        None => (None, ConfigFile::default()),
    };

    // Base directory is the parent of .professor/ (i.e., grandparent of config.yaml)
    let base_dir = config_file
        .as_deref()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let share = config.share.unwrap_or_default();
    let uploads = config.uploads.unwrap_or_default();
    let transcoder = config.transcoder.unwrap_or_default();

    let data_dir = if let Some(dir) = non_empty(env, "DATA_DIR") {
        PathBuf::from(dir)
    } else if let Some(ref dir) = config.data_dir {
        resolve_path(&base_dir, dir)
    } else {
        default_data_dir
    };
    let data_dir = if data_dir.is_absolute() {
        data_dir
    } else {
        std::env::current_dir()
            .context("Failed to resolve data directory")?
            .join(data_dir)
    };

    let base_url = non_empty(env, "BASE_URL")
        .or(share.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let share_secret = non_empty(env, "SHARE_SECRET")
        .or(share.secret)
        .unwrap_or_else(|| DEFAULT_SECRET.to_string());

    let share_ttl_seconds = parse_u64(env, "SHARE_TTL_SECONDS")?
        .or(share.ttl_seconds)
        .unwrap_or(DEFAULT_SHARE_TTL_SECONDS);

    let max_upload_mb = parse_u64(env, "MAX_UPLOAD_MB")?
        .or(uploads.max_upload_mb)
        .unwrap_or(DEFAULT_MAX_UPLOAD_MB);

    let transcoder_binary = non_empty(env, "FFMPEG_PATH")
        .or(transcoder.binary)
        .unwrap_or_else(|| DEFAULT_TRANSCODER.to_string());

    let transcoder_timeout_seconds = parse_u64(env, "TRANSCODER_TIMEOUT_SECONDS")?
        .or(transcoder.timeout_seconds)
        .unwrap_or(DEFAULT_TRANSCODER_TIMEOUT_SECONDS);

    Ok(Settings {
        data_dir,
        base_url,
        share_secret,
        share_ttl: Duration::from_secs(share_ttl_seconds),
        max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        transcoder_binary,
        transcoder_timeout: Duration::from_secs(transcoder_timeout_seconds),
        config_file,
    })
}

/// Load configuration from all sources
fn load_settings() -> Result<Settings> {
    let default_data_dir = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".professor");

    let env: HashMap<String, String> = std::env::vars().collect();

    match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            resolve(Some((path.as_path(), config)), &env, default_data_dir)
        }
        None => resolve(None, &env, default_data_dir),
    }
}

/// Get the global configuration (loads once, then cached)
pub fn settings() -> Result<&'static Settings> {
    let result = SETTINGS.get_or_init(|| load_settings().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(settings) => Ok(settings),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_settings() -> Result<Settings> {
    load_settings()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let settings = resolve(None, &HashMap::new(), PathBuf::from("/srv/professor")).unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("/srv/professor"));
        assert_eq!(settings.base_url, "http://localhost:8080");
        assert!(settings.uses_default_secret());
        assert_eq!(settings.share_ttl, Duration::from_secs(86_400));
        assert_eq!(settings.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(settings.transcoder_binary, "ffmpeg");
        assert!(settings.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".professor");
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
data_dir: ./data
share:
  base_url: https://lectures.example.com
  ttl_seconds: 600
uploads:
  max_upload_mb: 10
transcoder:
  binary: /usr/local/bin/ffmpeg
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        let settings = resolve(
            Some((config_path.as_path(), config)),
            &HashMap::new(),
            PathBuf::from("/unused"),
        )
        .unwrap();

        assert_eq!(settings.data_dir, temp.path().join("data"));
        assert_eq!(settings.base_url, "https://lectures.example.com");
        assert_eq!(settings.share_ttl, Duration::from_secs(600));
        assert_eq!(settings.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.transcoder_binary, "/usr/local/bin/ffmpeg");
        assert_eq!(settings.config_file, Some(config_path));
    }

    #[test]
    fn test_env_overrides_file() {
        let config = ConfigFile {
            share: Some(ShareConfig {
                secret: Some("from-file".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let settings = resolve(
            Some((Path::new("/proj/.professor/config.yaml"), config)),
            &env(&[
                ("SHARE_SECRET", "from-env"),
                ("MAX_UPLOAD_MB", "0"),
                ("DATA_DIR", "/var/lib/professor"),
            ]),
            PathBuf::from("/unused"),
        )
        .unwrap();

        assert_eq!(settings.share_secret, "from-env");
        assert_eq!(settings.max_upload_bytes, 0);
        assert_eq!(settings.data_dir, PathBuf::from("/var/lib/professor"));
    }

    #[test]
    fn test_invalid_integer_names_the_variable() {
        let err = resolve(
            None,
            &env(&[("SHARE_TTL_SECONDS", "tomorrow")]),
            PathBuf::from("/unused"),
        )
        .unwrap_err();

        assert!(format!("{:#}", err).contains("SHARE_TTL_SECONDS"));
    }
}
