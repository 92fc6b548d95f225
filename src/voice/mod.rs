//! Voice processing module
//!
//! Handles audio capture, wake word monitoring, command listening, and
//! interruptible speech playback. Transcription and synthesis are delegated
//! to cloud endpoints (see `stt.rs` / `tts.rs`).

mod capture;
mod listener;
mod player;
mod stt;
mod tts;
mod wake;

pub use capture::{samples_to_wav, AudioCapture, SAMPLE_RATE};
pub use listener::{CommandListener, ListenOutcome};
pub use player::{decode_mp3, AudioPlayback, SpeechPlayer, PLAYBACK_SAMPLE_RATE, POLL_INTERVAL};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
pub use wake::{EnergySpotter, KeywordSpotter, WakeWordMonitor, FRAME_LENGTH};
