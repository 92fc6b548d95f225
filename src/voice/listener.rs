//! Command listening
//!
//! Captures one utterance after the wake word: calibrate against ambient
//! noise, wait for speech onset, record until trailing silence or the phrase
//! limit, then hand the WAV to the cloud transcriber. A failed listen is
//! equivalent to silence; it never crashes the loop.

use std::time::{Duration, Instant};

use crate::voice::capture::{samples_to_wav, AudioCapture, SAMPLE_RATE};
use crate::voice::stt::SpeechToText;
use crate::voice::wake::calculate_energy;
use crate::{Error, Result};

/// Fixed ambient-noise calibration window
const CALIBRATION_WINDOW: Duration = Duration::from_millis(500);

/// Chunk size for energy gating (50ms at 16kHz)
const CHUNK: usize = 800;

/// Trailing silence that ends a phrase early
const TRAILING_SILENCE: Duration = Duration::from_millis(800);

/// Speech threshold as a multiple of the calibrated ambient energy
const THRESHOLD_FACTOR: f32 = 2.0;

/// Floor for the speech threshold in very quiet rooms
const MIN_THRESHOLD: f32 = 0.015;

/// Outcome of one listen attempt
///
/// No speech, unintelligible speech, and service rejection all collapse to
/// "no command this turn"; `Failed` carries detail for the log but the loop
/// treats it the same as `Silence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenOutcome {
    /// A non-empty transcription was obtained
    Heard(String),
    /// No usable speech this turn
    Silence,
    /// An unexpected failure, treated as silence by the caller
    Failed(String),
}

/// Captures one utterance and returns its transcription
pub struct CommandListener {
    stt: SpeechToText,
    listen_timeout: Duration,
    phrase_limit: Duration,
}

impl CommandListener {
    /// Create a listener
    ///
    /// * `listen_timeout` - max wait for speech to start
    /// * `phrase_limit` - max total utterance duration
    #[must_use]
    pub const fn new(stt: SpeechToText, listen_timeout: Duration, phrase_limit: Duration) -> Self {
        Self {
            stt,
            listen_timeout,
            phrase_limit,
        }
    }

    /// Listen for one command
    ///
    /// Never returns an error: every failure mode collapses into the
    /// three-variant [`ListenOutcome`].
    pub async fn listen(&self, capture: &AudioCapture) -> ListenOutcome {
        tracing::debug!("listening for command");

        let phrase = match self.capture_phrase(capture) {
            Ok(Some(samples)) => samples,
            Ok(None) => {
                tracing::warn!("no speech detected");
                return ListenOutcome::Silence;
            }
            Err(e) => {
                tracing::error!(error = %e, "listen failed");
                return ListenOutcome::Failed(e.to_string());
            }
        };

        let wav = match samples_to_wav(&phrase, SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode utterance");
                return ListenOutcome::Failed(e.to_string());
            }
        };

        match self.stt.transcribe(&wav).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::warn!("could not understand audio");
                    ListenOutcome::Silence
                } else {
                    tracing::info!(text, "recognized command");
                    ListenOutcome::Heard(text.to_string())
                }
            }
            Err(Error::Stt(reason)) => {
                tracing::warn!(reason, "transcription rejected");
                ListenOutcome::Silence
            }
            Err(e) => {
                tracing::error!(error = %e, "unexpected transcription failure");
                ListenOutcome::Failed(e.to_string())
            }
        }
    }

    /// Record one phrase: calibrate, wait for onset, capture until silence
    ///
    /// Returns `Ok(None)` when no speech starts before the listen timeout.
    #[allow(clippy::cast_possible_truncation)]
    fn capture_phrase(&self, capture: &AudioCapture) -> Result<Option<Vec<i16>>> {
        capture.clear_buffer();

        let calibration_samples =
            (SAMPLE_RATE as usize) * (CALIBRATION_WINDOW.as_millis() as usize) / 1000;
        let ambient = capture.read_frame(calibration_samples)?;
        let threshold = speech_threshold(calculate_energy(&ambient));
        tracing::debug!(threshold, "ambient noise calibration complete");

        let chunk_duration = Duration::from_millis((CHUNK * 1000 / SAMPLE_RATE as usize) as u64);

        // Wait for speech onset
        let onset_deadline = Instant::now() + self.listen_timeout;
        let mut phrase: Vec<i16> = Vec::new();
        loop {
            if Instant::now() >= onset_deadline {
                return Ok(None);
            }
            let chunk = capture.read_frame(CHUNK)?;
            if calculate_energy(&chunk) > threshold {
                phrase.extend_from_slice(&chunk);
                break;
            }
        }

        // Capture until trailing silence or the phrase limit
        let phrase_deadline = Instant::now() + self.phrase_limit;
        let mut silent = Duration::ZERO;
        while Instant::now() < phrase_deadline {
            let chunk = capture.read_frame(CHUNK)?;
            let is_speech = calculate_energy(&chunk) > threshold;
            phrase.extend_from_slice(&chunk);

            if is_speech {
                silent = Duration::ZERO;
            } else {
                silent += chunk_duration;
                if silent >= TRAILING_SILENCE {
                    break;
                }
            }
        }

        tracing::debug!(samples = phrase.len(), "utterance captured");
        Ok(Some(phrase))
    }
}

/// Speech threshold from the calibrated ambient energy
fn speech_threshold(ambient_energy: f32) -> f32 {
    (ambient_energy * THRESHOLD_FACTOR).max(MIN_THRESHOLD)
}
