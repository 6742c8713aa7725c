//! # Configuration
//! Settings for the declutter engine, with the defaults the feature ships
//! with. Loadable from TOML or JSON; out-of-range values are clamped once
//! on load, never re-validated on the hot path.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PATH: &str = "DECLUTTER_CONFIG_PATH";

pub const DEFAULT_SIMILARITY_THRESHOLD: u8 = 80;
pub const DEFAULT_REPETITION_THRESHOLD: u32 = 3;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;
/// Upper bound for `cache_ttl_secs` (one year). Keeps the TTL well inside
/// what `chrono::Duration::seconds` can represent.
pub const MAX_CACHE_TTL_SECS: u64 = 31_536_000;
pub const DEFAULT_ANNOTATION_COLOR: &str = "#FF0000";

/// How cache partitions are keyed.
///
/// `Global` answers "has anyone said this recently"; `PerAuthor` answers
/// "is this author repeating themselves". One flag, one engine — never two
/// code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyingMode {
    #[default]
    Global,
    PerAuthor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclutterConfig {
    /// Percentage in 0–100; messages scoring strictly above this fraction
    /// count as repeats.
    pub similarity_threshold: u8,
    /// Repetition count at or above which a message is repetitive. At least 1.
    pub repetition_threshold: u32,
    /// Skip messages carrying a moderator or broadcaster badge.
    pub ignore_moderators: bool,
    /// Keep filtering even when the local viewer moderates the channel.
    pub force_enabled_for_moderators: bool,
    /// How long cached history lives without fresh traffic, in seconds.
    /// Clamped on load to at least 1 and at most [`MAX_CACHE_TTL_SECS`].
    pub cache_ttl_secs: u64,
    /// Badge repetitive messages instead of hiding them.
    pub annotate_instead_of_hide: bool,
    /// Badge color, passed through opaquely to the renderer.
    pub annotation_color: String,
    pub keying: KeyingMode,
}

impl Default for DeclutterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            repetition_threshold: DEFAULT_REPETITION_THRESHOLD,
            ignore_moderators: true,
            force_enabled_for_moderators: false,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            annotate_instead_of_hide: false,
            annotation_color: DEFAULT_ANNOTATION_COLOR.to_string(),
            keying: KeyingMode::Global,
        }
    }
}

impl DeclutterConfig {
    /// Basic parameter hygiene: clamp out-of-range values into contract.
    pub fn normalized(mut self) -> Self {
        if self.similarity_threshold > 100 {
            self.similarity_threshold = 100;
        }
        if self.repetition_threshold == 0 {
            self.repetition_threshold = 1;
        }
        if self.cache_ttl_secs == 0 {
            self.cache_ttl_secs = 1;
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            self.cache_ttl_secs = MAX_CACHE_TTL_SECS;
        }
        self
    }

    /// `similarity_threshold` as a fraction in `[0.0, 1.0]`.
    pub fn similarity_fraction(&self) -> f64 {
        f64::from(self.similarity_threshold) / 100.0
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs as i64)
    }

    /// Eviction runs ten times per TTL window, but never more than once a
    /// second nor less than once every ten seconds.
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs((self.cache_ttl_secs / 10).clamp(1, 10))
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading declutter config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
    }

    /// Load using env var + fallbacks:
    /// 1) $DECLUTTER_CONFIG_PATH
    /// 2) config/declutter.toml
    /// 3) config/declutter.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("DECLUTTER_CONFIG_PATH points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from("config/declutter.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/declutter.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<DeclutterConfig> {
    let looks_like_json = s.trim_start().starts_with('{');
    let try_toml = hint_ext == "toml" || !looks_like_json;
    if try_toml {
        if let Ok(v) = toml::from_str::<DeclutterConfig>(s) {
            return Ok(v.normalized());
        }
    }
    if let Ok(v) = serde_json::from_str::<DeclutterConfig>(s) {
        return Ok(v.normalized());
    }
    if !try_toml {
        if let Ok(v) = toml::from_str::<DeclutterConfig>(s) {
            return Ok(v.normalized());
        }
    }
    Err(anyhow!("unsupported declutter config format"))
}
