use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use popchat_conversation::DEFAULT_WELCOME_TEXT;
use popchat_replies::{
    DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY, DEFAULT_REPLY_TIMEOUT, DelayPolicy, ResponderConfig,
    RigConfig, default_reply_candidates,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{ResultExt, Snafu};

use crate::chat::BusyPolicy;

pub const DEFAULT_PROVIDER_ID: &str = "openai";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const SETTINGS_DIRECTORY_NAME: &str = "popchat";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "POPCHAT_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderKind {
    #[default]
    Canned,
    Rig,
}

/// Backend selection. The connection fields only matter for `Rig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderSettings {
    #[serde(default)]
    pub kind: ResponderKind,
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub preamble: Option<String>,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            kind: ResponderKind::default(),
            provider_id: default_provider_id(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            model: default_model(),
            preamble: None,
        }
    }
}

impl ResponderSettings {
    fn normalized(mut self) -> Self {
        self.provider_id = non_blank_or(self.provider_id, default_provider_id);
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = non_blank_or(self.endpoint, default_endpoint);
        self.model = non_blank_or(self.model, default_model);
        self.preamble = self
            .preamble
            .map(|preamble| preamble.trim().to_string())
            .filter(|preamble| !preamble.is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(
        default = "default_theme_mode",
        serialize_with = "serialize_theme_mode",
        deserialize_with = "deserialize_theme_mode"
    )]
    pub theme_mode: ThemeMode,
    #[serde(default = "default_welcome_message")]
    pub welcome_message: Option<String>,
    #[serde(default = "default_reply_candidates")]
    pub reply_candidates: Vec<String>,
    #[serde(default = "default_reply_delay_min_ms")]
    pub reply_delay_min_ms: u64,
    #[serde(default = "default_reply_delay_max_ms")]
    pub reply_delay_max_ms: u64,
    /// Zero disables the responder timeout.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    #[serde(default)]
    pub busy_policy: BusyPolicy,
    /// Fixes reply selection and delays when set.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub responder: ResponderSettings,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            theme_mode: default_theme_mode(),
            welcome_message: default_welcome_message(),
            reply_candidates: default_reply_candidates(),
            reply_delay_min_ms: default_reply_delay_min_ms(),
            reply_delay_max_ms: default_reply_delay_max_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
            busy_policy: BusyPolicy::default(),
            seed: None,
            responder: ResponderSettings::default(),
        }
    }
}

impl ChatSettings {
    pub fn normalized(mut self) -> Self {
        self.welcome_message = self
            .welcome_message
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        self.reply_candidates = self
            .reply_candidates
            .into_iter()
            .map(|candidate| candidate.trim().to_string())
            .filter(|candidate| !candidate.is_empty())
            .collect();
        if self.reply_candidates.is_empty() {
            self.reply_candidates = default_reply_candidates();
        }

        if self.reply_delay_min_ms > self.reply_delay_max_ms {
            std::mem::swap(&mut self.reply_delay_min_ms, &mut self.reply_delay_max_ms);
        }

        self.responder = self.responder.normalized();
        self
    }

    pub fn delay_policy(&self) -> DelayPolicy {
        DelayPolicy::uniform(
            Duration::from_millis(self.reply_delay_min_ms),
            Duration::from_millis(self.reply_delay_max_ms),
        )
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_ms > 0).then(|| Duration::from_millis(self.reply_timeout_ms))
    }

    pub fn responder_config(&self) -> ResponderConfig {
        match self.responder.kind {
            ResponderKind::Canned => ResponderConfig::Canned {
                candidates: self.reply_candidates.clone(),
                seed: self.seed,
            },
            ResponderKind::Rig => {
                let responder = &self.responder;
                let mut config = RigConfig::new(
                    &responder.provider_id,
                    &responder.api_key,
                    &responder.endpoint,
                    &responder.model,
                );
                if let Some(preamble) = &responder.preamble {
                    config = config.with_preamble(preamble);
                }
                ResponderConfig::Rig(config)
            }
        }
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ChatSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".popchat"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_sources(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ChatSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: ChatSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    /// Persists a theme flip without touching the other fields.
    pub fn update_theme(&self, theme_mode: ThemeMode) -> Result<(), SettingsError> {
        let mut settings = (*self.settings()).clone();
        if settings.theme_mode == theme_mode {
            return Ok(());
        }
        settings.theme_mode = theme_mode;
        self.update(settings)
    }

    fn load_from_sources(path: &Path) -> ChatSettings {
        if !path.exists() {
            tracing::info!(path = ?path, "settings file not found, using defaults");
        }

        // Missing files contribute nothing; environment variables always apply.
        let figment = Figment::from(Serialized::defaults(ChatSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        match figment.extract::<ChatSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    path = ?path,
                    error = %error,
                    "failed to parse settings, using defaults"
                );
                ChatSettings::default()
            }
        }
    }

    fn persist(&self, settings: &ChatSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!(path = ?self.config_path, "saved settings");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn non_blank_or(value: String, fallback: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn default_provider_id() -> String {
    DEFAULT_PROVIDER_ID.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_welcome_message() -> Option<String> {
    Some(DEFAULT_WELCOME_TEXT.to_string())
}

fn default_reply_delay_min_ms() -> u64 {
    duration_ms(DEFAULT_MIN_DELAY)
}

fn default_reply_delay_max_ms() -> u64 {
    duration_ms(DEFAULT_MAX_DELAY)
}

fn default_reply_timeout_ms() -> u64 {
    duration_ms(DEFAULT_REPLY_TIMEOUT)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_theme_mode() -> ThemeMode {
    ThemeMode::Light
}

fn serialize_theme_mode<S>(value: &ThemeMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.name())
}

fn deserialize_theme_mode<'de, D>(deserializer: D) -> Result<ThemeMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_theme_mode(&value))
}

fn parse_theme_mode(value: &str) -> ThemeMode {
    if value.trim().eq_ignore_ascii_case("dark") {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}
