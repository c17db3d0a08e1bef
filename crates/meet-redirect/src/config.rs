use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::host::WindowKind;

pub const CONFIG_FILENAME: &str = "config.json";
pub const CONFIG_VERSION: &str = "1.0.0";

pub const ENV_BIND: &str = "MEET_REDIRECT_BIND";
pub const ENV_CLEANUP_DELAY_MS: &str = "MEET_REDIRECT_CLEANUP_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectConfig {
    pub version: String,
    pub meeting: MeetingConfig,
    pub windows: WindowConfig,
    pub cleanup: CleanupConfig,
    pub signal: SignalConfig,
    pub server: ServerConfig,
}

/// Describes the meeting application's URL scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingConfig {
    pub origin: String,
    /// First path segment that starts a brand-new meeting.
    pub new_meeting_marker: String,
    /// Fragments starting with any of these are internal pages, never
    /// redirect destinations.
    pub passthrough_markers: Vec<String>,
    /// Fragment written into the persisted record when it is reset.
    pub initial_state_marker: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub designated_kinds: Vec<WindowKind>,
    pub create_kind: WindowKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupConfig {
    pub delay_ms: u64,
    pub clear_on_consume: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub opened_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub command_timeout_ms: u64,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            meeting: MeetingConfig::default(),
            windows: WindowConfig {
                designated_kinds: vec![WindowKind::App, WindowKind::Popup],
                create_kind: WindowKind::Popup,
            },
            cleanup: CleanupConfig {
                delay_ms: 3_000,
                clear_on_consume: true,
            },
            signal: SignalConfig {
                opened_key: "googleMeetOpenedUrl".to_string(),
            },
            server: ServerConfig {
                bind: "127.0.0.1:4850".to_string(),
                command_timeout_ms: 5_000,
            },
        }
    }
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            origin: "https://meet.google.com/".to_string(),
            new_meeting_marker: "new".to_string(),
            passthrough_markers: vec!["new".to_string(), "_meet".to_string()],
            initial_state_marker: "__gmInitialState".to_string(),
        }
    }
}

impl CleanupConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> CoreResult<SocketAddr> {
        self.bind
            .parse()
            .map_err(|error| CoreError::InvalidInput(format!("invalid bind address {}: {error}", self.bind)))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl RedirectConfig {
    pub fn validate(&self) -> CoreResult<()> {
        let origin = url::Url::parse(&self.meeting.origin).map_err(|error| {
            CoreError::InvalidInput(format!(
                "invalid meeting origin {}: {error}",
                self.meeting.origin
            ))
        })?;
        if origin.host_str().is_none() {
            return Err(CoreError::InvalidInput(format!(
                "meeting origin {} has no host",
                self.meeting.origin
            )));
        }
        if self.meeting.new_meeting_marker.is_empty() {
            return Err(CoreError::InvalidInput(
                "new meeting marker must not be empty".to_string(),
            ));
        }
        if self.meeting.passthrough_markers.iter().any(String::is_empty) {
            return Err(CoreError::InvalidInput(
                "passthrough markers must not be empty".to_string(),
            ));
        }
        if self.windows.designated_kinds.is_empty() {
            return Err(CoreError::InvalidInput(
                "at least one designated window kind is required".to_string(),
            ));
        }
        if self.signal.opened_key.is_empty() {
            return Err(CoreError::InvalidInput(
                "opened signal key must not be empty".to_string(),
            ));
        }
        self.server.bind_addr()?;
        Ok(())
    }

    /// Layers environment overrides, then an explicit bind address, over the
    /// file values and validates the merged result.
    pub fn resolve(self, bind: Option<String>) -> CoreResult<Self> {
        self.resolve_with(|key| std::env::var(key).ok(), bind)
    }

    fn resolve_with(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
        bind: Option<String>,
    ) -> CoreResult<Self> {
        self.apply_overrides(lookup)?;
        if let Some(bind) = bind {
            self.server.bind = bind;
        }
        self.validate()?;
        Ok(self)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> CoreResult<()> {
        if let Some(bind) = lookup(ENV_BIND) {
            self.server.bind = bind;
        }
        if let Some(delay) = lookup(ENV_CLEANUP_DELAY_MS) {
            self.cleanup.delay_ms = delay.trim().parse().map_err(|error| {
                CoreError::InvalidInput(format!("invalid {ENV_CLEANUP_DELAY_MS} {delay}: {error}"))
            })?;
        }
        Ok(())
    }
}

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILENAME)
}

pub fn load_or_create_config(dir: &Path) -> CoreResult<RedirectConfig> {
    std::fs::create_dir_all(dir).map_err(|error| {
        CoreError::Internal(format!(
            "failed to create state directory {}: {error}",
            dir.display()
        ))
    })?;

    let path = config_path(dir);
    if !path.exists() {
        let config = RedirectConfig::default();
        write_config(&path, &config)?;
        tracing::info!("wrote default config to {}", path.display());
        return Ok(config);
    }

    let data = std::fs::read_to_string(&path).map_err(|error| {
        CoreError::Internal(format!("failed to read config {}: {error}", path.display()))
    })?;
    let config: RedirectConfig = serde_json::from_str(&data).map_err(|error| {
        CoreError::InvalidInput(format!("failed to parse config {}: {error}", path.display()))
    })?;
    if config.version != CONFIG_VERSION {
        tracing::warn!(
            "config {} has version {}, expected {}",
            path.display(),
            config.version,
            CONFIG_VERSION
        );
    }
    config.validate()?;
    Ok(config)
}

fn write_config(path: &Path, config: &RedirectConfig) -> CoreResult<()> {
    let data = serde_json::to_string_pretty(config)
        .map_err(|error| CoreError::Internal(format!("failed to serialize config: {error}")))?;
    std::fs::write(path, data).map_err(|error| {
        CoreError::Internal(format!("failed to write config {}: {error}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_default_config_when_missing() {
        let dir = tempdir().expect("tempdir");
        let config = load_or_create_config(dir.path()).expect("load");
        assert_eq!(config, RedirectConfig::default());
        assert!(config_path(dir.path()).exists());
    }

    #[test]
    fn reads_existing_config() {
        let dir = tempdir().expect("tempdir");
        let mut custom = RedirectConfig::default();
        custom.cleanup.delay_ms = 1_500;
        custom.meeting.passthrough_markers = vec!["landing".to_string()];
        write_config(&config_path(dir.path()), &custom).expect("write");

        let loaded = load_or_create_config(dir.path()).expect("load");
        assert_eq!(loaded.cleanup.delay(), Duration::from_millis(1_500));
        assert_eq!(loaded.meeting.passthrough_markers, vec!["landing"]);
    }

    #[test]
    fn rejects_malformed_config() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(config_path(dir.path()), "{ not json").expect("write");
        let error = load_or_create_config(dir.path()).expect_err("should fail");
        assert!(matches!(error, CoreError::InvalidInput(_)));
    }

    #[test]
    fn rejects_origin_without_host() {
        let mut config = RedirectConfig::default();
        config.meeting.origin = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_window_kinds() {
        let mut config = RedirectConfig::default();
        config.windows.designated_kinds.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RedirectConfig::default();
        config
            .apply_overrides(|key| match key {
                ENV_BIND => Some("127.0.0.1:9999".to_string()),
                ENV_CLEANUP_DELAY_MS => Some("250".to_string()),
                _ => None,
            })
            .expect("overrides");
        assert_eq!(config.server.bind, "127.0.0.1:9999");
        assert_eq!(config.cleanup.delay_ms, 250);
    }

    #[test]
    fn invalid_env_delay_is_rejected() {
        let mut config = RedirectConfig::default();
        let error = config
            .apply_overrides(|key| (key == ENV_CLEANUP_DELAY_MS).then(|| "soon".to_string()))
            .expect_err("should fail");
        assert!(matches!(error, CoreError::InvalidInput(_)));
    }

    #[test]
    fn overrides_are_validated_after_merge() {
        let error = RedirectConfig::default()
            .resolve_with(|_| None, Some("localhost-ish".to_string()))
            .expect_err("should fail");
        assert!(matches!(error, CoreError::InvalidInput(_)));

        let error = RedirectConfig::default()
            .resolve_with(|key| (key == ENV_BIND).then(|| "nowhere".to_string()), None)
            .expect_err("should fail");
        assert!(matches!(error, CoreError::InvalidInput(_)));
    }

    #[test]
    fn explicit_bind_wins_over_environment() {
        let config = RedirectConfig::default()
            .resolve_with(
                |key| (key == ENV_BIND).then(|| "127.0.0.1:9999".to_string()),
                Some("127.0.0.1:7000".to_string()),
            )
            .expect("resolve");
        assert_eq!(config.server.bind_addr().expect("addr").port(), 7000);
    }

    #[test]
    fn default_serializes_window_kinds_lowercase() {
        let value = serde_json::to_value(RedirectConfig::default()).expect("serialize");
        assert_eq!(value["windows"]["designated_kinds"], serde_json::json!(["app", "popup"]));
        assert_eq!(value["windows"]["create_kind"], "popup");
    }
}
