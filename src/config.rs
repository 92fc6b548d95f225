//! Configuration management for valet
//!
//! Precedence: environment variables > optional TOML config file > built-in
//! defaults. Defaults reproduce the classic single-keyword assistant surface:
//! one wake word, one voice, a local generation endpoint.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Valet configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Wake word that starts (and interrupts) a conversation
    pub wake_word: String,

    /// Spoken acknowledgment after the wake word is heard
    pub greeting: String,

    /// Spoken sign-off when a session times out
    pub standby: String,

    /// Generation endpoint (`POST {model, prompt, stream: true}`)
    pub generate_url: String,

    /// Generation model identifier
    pub model: String,

    /// STT transcription endpoint (multipart WAV upload)
    pub stt_url: String,

    /// STT model identifier
    pub stt_model: String,

    /// TTS synthesis endpoint (returns MP3 bytes)
    pub tts_url: String,

    /// TTS model identifier
    pub tts_model: String,

    /// TTS voice identifier (fixed single voice)
    pub tts_voice: String,

    /// TTS speed multiplier
    pub tts_speed: f32,

    /// API key for the STT/TTS endpoints, if they require one
    pub api_key: Option<String>,

    /// Max wait for speech onset during a listen
    pub listen_timeout: Duration,

    /// Max total utterance duration during a listen
    pub phrase_limit: Duration,

    /// Inactivity window after which a session reverts to idle
    pub idle_timeout: Duration,

    /// Inactivity threshold past which a follow-up notice is logged
    pub follow_up_notice: Duration,
}

/// Optional TOML config file contents (all fields optional)
#[derive(Debug, Default, serde::Deserialize)]
struct ConfigFile {
    #[serde(default)]
    assistant: AssistantFile,
    #[serde(default)]
    generate: GenerateFile,
    #[serde(default)]
    voice: VoiceFile,
}

#[derive(Debug, Default, serde::Deserialize)]
struct AssistantFile {
    wake_word: Option<String>,
    greeting: Option<String>,
    standby: Option<String>,
    idle_timeout_secs: Option<u64>,
    follow_up_notice_secs: Option<u64>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct GenerateFile {
    url: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct VoiceFile {
    stt_url: Option<String>,
    stt_model: Option<String>,
    tts_url: Option<String>,
    tts_model: Option<String>,
    tts_voice: Option<String>,
    tts_speed: Option<f32>,
    listen_timeout_secs: Option<u64>,
    phrase_limit_secs: Option<u64>,
}

/// Return the config file path: `~/.config/valet/config.toml`
fn config_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".config/valet/config.toml"),
        |d| d.config_dir().join("valet").join("config.toml"),
    )
}

/// Load the optional TOML config file, falling back to defaults
fn load_config_file() -> ConfigFile {
    let path = config_path();
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(fc) => {
                tracing::debug!(path = %path.display(), "loaded config file");
                fc
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
            ConfigFile::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wake_word: "jarvis".to_string(),
            greeting: "At your service, sir".to_string(),
            standby: "Standing by".to_string(),
            generate_url: "http://localhost:11434/api/generate".to_string(),
            model: "llama3".to_string(),
            stt_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_url: "https://api.openai.com/v1/audio/speech".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "onyx".to_string(),
            tts_speed: 1.0,
            api_key: None,
            listen_timeout: Duration::from_secs(5),
            phrase_limit: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
            follow_up_notice: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration (env > TOML file > default)
    ///
    /// # Errors
    ///
    /// Returns error if a configured value fails validation.
    pub fn load() -> Result<Self> {
        let fc = load_config_file();
        let default = Self::default();

        let config = Self {
            wake_word: std::env::var("VALET_WAKE_WORD")
                .ok()
                .or(fc.assistant.wake_word)
                .unwrap_or(default.wake_word),
            greeting: fc.assistant.greeting.unwrap_or(default.greeting),
            standby: fc.assistant.standby.unwrap_or(default.standby),
            generate_url: std::env::var("VALET_GENERATE_URL")
                .ok()
                .or(fc.generate.url)
                .unwrap_or(default.generate_url),
            model: std::env::var("VALET_MODEL")
                .ok()
                .or(fc.generate.model)
                .unwrap_or(default.model),
            stt_url: fc.voice.stt_url.unwrap_or(default.stt_url),
            stt_model: std::env::var("VALET_STT_MODEL")
                .ok()
                .or(fc.voice.stt_model)
                .unwrap_or(default.stt_model),
            tts_url: fc.voice.tts_url.unwrap_or(default.tts_url),
            tts_model: std::env::var("VALET_TTS_MODEL")
                .ok()
                .or(fc.voice.tts_model)
                .unwrap_or(default.tts_model),
            tts_voice: std::env::var("VALET_TTS_VOICE")
                .ok()
                .or(fc.voice.tts_voice)
                .unwrap_or(default.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(default.tts_speed),
            api_key: std::env::var("VALET_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok()),
            listen_timeout: fc
                .voice
                .listen_timeout_secs
                .map_or(default.listen_timeout, Duration::from_secs),
            phrase_limit: fc
                .voice
                .phrase_limit_secs
                .map_or(default.phrase_limit, Duration::from_secs),
            idle_timeout: fc
                .assistant
                .idle_timeout_secs
                .map_or(default.idle_timeout, Duration::from_secs),
            follow_up_notice: fc
                .assistant
                .follow_up_notice_secs
                .map_or(default.follow_up_notice, Duration::from_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configured values
    ///
    /// # Errors
    ///
    /// Returns error if the wake word is empty or the timing windows are
    /// inverted.
    pub fn validate(&self) -> Result<()> {
        if self.wake_word.trim().is_empty() {
            return Err(Error::Config("wake word must not be empty".to_string()));
        }
        if self.follow_up_notice >= self.idle_timeout {
            return Err(Error::Config(format!(
                "follow-up notice ({:?}) must be shorter than idle timeout ({:?})",
                self.follow_up_notice, self.idle_timeout
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.wake_word, "jarvis");
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert!(config.follow_up_notice < config.idle_timeout);
    }

    #[test]
    fn empty_wake_word_rejected() {
        let config = Config {
            wake_word: "  ".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn inverted_windows_rejected() {
        let config = Config {
            follow_up_notice: Duration::from_secs(40),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_file_parses_partial_toml() {
        let fc: ConfigFile = toml::from_str(
            r#"
            [assistant]
            wake_word = "computer"

            [generate]
            model = "llama3.2"
            "#,
        )
        .unwrap();

        assert_eq!(fc.assistant.wake_word.as_deref(), Some("computer"));
        assert_eq!(fc.generate.model.as_deref(), Some("llama3.2"));
        assert!(fc.voice.tts_voice.is_none());
    }
}
