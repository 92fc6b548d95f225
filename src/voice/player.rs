//! Speech playback with wake-word interruption
//!
//! Synthesizes one chunk of text to a temporary MP3 artifact, plays it to the
//! speakers, and polls the wake-word monitor at a fixed cadence while
//! playback is active so the user can cut the assistant off. The artifact is
//! deleted on every exit path.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::voice::capture::AudioCapture;
use crate::voice::tts::TextToSpeech;
use crate::voice::wake::{KeywordSpotter, WakeWordMonitor};
use crate::{Error, Result};

/// Wake-word polling cadence during playback
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sample rate for playback (matches common TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Plays audio to the default output device
pub struct AudioPlayback {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if the audio device cannot be opened. Fatal: there is no
    /// degraded mode without speakers.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Play samples to completion without interruption (diagnostics)
    ///
    /// # Errors
    ///
    /// Returns error if playback fails.
    pub fn play_blocking(&self, samples: Vec<f32>) -> Result<()> {
        self.play_samples(samples, || Ok(false)).map(|_| ())
    }

    /// Play samples, polling `interrupt` at [`POLL_INTERVAL`]
    ///
    /// Returns true if `interrupt` reported true before playback finished;
    /// the stream is stopped within one polling interval.
    fn play_samples(
        &self,
        samples: Vec<f32>,
        mut interrupt: impl FnMut() -> Result<bool>,
    ) -> Result<bool> {
        if samples.is_empty() {
            return Ok(false);
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = self.config.clone();
        let channels = config.channels as usize;

        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(Mutex::new(0usize));
        let finished = Arc::new(Mutex::new(false));
        let finished_clone = Arc::clone(&finished);

        let samples_clone = Arc::clone(&samples);
        let position_clone = Arc::clone(&position);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position_clone.lock().unwrap();

                    for frame in data.chunks_mut(channels) {
                        let sample = if *pos < samples_clone.len() {
                            samples_clone[*pos]
                        } else {
                            *finished_clone.lock().unwrap() = true;
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }

                        if *pos < samples_clone.len() {
                            *pos += 1;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let start = Instant::now();
        let timeout = Duration::from_millis(duration_ms + 500);

        while !*finished.lock().unwrap() {
            if start.elapsed() > timeout {
                break;
            }
            if interrupt()? {
                drop(stream);
                tracing::debug!("playback stopped");
                return Ok(true);
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        // Small delay to let the tail drain
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(false)
    }
}

/// Speaks text via TTS, interruptible by the wake word
pub struct SpeechPlayer {
    tts: TextToSpeech,
    playback: AudioPlayback,
    temp_dir: tempfile::TempDir,
}

impl SpeechPlayer {
    /// Create a player around a TTS client
    ///
    /// # Errors
    ///
    /// Returns error if the output device or temp directory cannot be set up.
    pub fn new(tts: TextToSpeech) -> Result<Self> {
        Ok(Self {
            tts,
            playback: AudioPlayback::new()?,
            temp_dir: tempfile::tempdir()?,
        })
    }

    /// Synthesize and speak `text`, polling the wake monitor during playback
    ///
    /// Returns true if the wake word interrupted playback. The temporary
    /// audio artifact is deleted on every exit path.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis, decoding, playback, or a wake-monitor
    /// frame read fails.
    pub async fn play<S: KeywordSpotter>(
        &self,
        text: &str,
        monitor: &mut WakeWordMonitor<S>,
        capture: &AudioCapture,
    ) -> Result<bool> {
        tracing::info!(text, "speaking");

        let audio = self.tts.synthesize(text).await?;

        let artifact = self.temp_dir.path().join("reply.mp3");
        fs::write(&artifact, &audio)?;
        let _guard = ArtifactGuard(&artifact);

        let samples = decode_mp3(&fs::read(&artifact)?)?;

        // Audio captured before playback started must not count as an
        // interrupt, and neither should a stale energy run.
        monitor.reset();
        capture.clear_buffer();

        let interrupted = self
            .playback
            .play_samples(samples, || monitor.detect(capture))?;

        if interrupted {
            tracing::info!("speech interrupted by wake word");
        }
        Ok(interrupted)
    }
}

/// Deletes the artifact when playback unwinds, however it unwinds
struct ArtifactGuard<'a>(&'a Path);

impl Drop for ArtifactGuard<'_> {
    fn drop(&mut self) {
        remove_artifact(self.0);
    }
}

/// Remove a synthesized audio artifact; failures are silently ignored
fn remove_artifact(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(path = %path.display(), error = %e, "artifact cleanup failed");
        }
    }
}

/// Decode MP3 bytes to f32 samples
///
/// # Errors
///
/// Returns error if a frame fails to decode.
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                // Convert i16 samples to f32 and fold stereo to mono
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            (left + right) / 2.0
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}
