//! Audio capture from microphone
//!
//! Mono 16-bit signed samples at a fixed rate, buffered from a cpal input
//! stream. The wake monitor and command listener both drain this buffer, one
//! at a time, from the single conversation loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Sleep granularity while waiting for buffered samples
const READ_POLL: Duration = Duration::from_millis(10);

/// Captures audio from the default input device
pub struct AudioCapture {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<VecDeque<i16>>>,
    failed: Arc<AtomicBool>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if no input device offers a mono config at
    /// [`SAMPLE_RATE`]. This is fatal: there is no degraded mode without a
    /// working microphone.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(VecDeque::new())),
            failed: Arc::new(AtomicBool::new(false)),
            stream: None,
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built or started.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        self.failed.store(false, Ordering::Relaxed);

        let buffer = Arc::clone(&self.buffer);
        let failed = Arc::clone(&self.failed);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let config = self.config.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        #[allow(clippy::cast_possible_truncation)]
                        buf.extend(
                            data.iter()
                                .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16),
                        );
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio capture error");
                    failed.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Read exactly `len` samples, blocking until they are available
    ///
    /// # Errors
    ///
    /// Returns error if capture has not been started (the buffer can never
    /// fill), the input stream has reported a failure, or the buffer lock is
    /// poisoned.
    pub fn read_frame(&self, len: usize) -> Result<Vec<i16>> {
        if self.stream.is_none() {
            return Err(Error::Audio("capture not started".to_string()));
        }

        drain_frame(&self.buffer, &self.failed, len)
    }

    /// Clear the audio buffer
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }
}

/// Block until `len` samples are buffered, failing if the stream has died
///
/// The cpal error callback sets `failed`; without this check a dead input
/// stream would leave the buffer starved and this loop spinning forever.
fn drain_frame(
    buffer: &Mutex<VecDeque<i16>>,
    failed: &AtomicBool,
    len: usize,
) -> Result<Vec<i16>> {
    loop {
        if failed.load(Ordering::Relaxed) {
            return Err(Error::Audio("input stream failed".to_string()));
        }

        {
            let mut buf = buffer
                .lock()
                .map_err(|_| Error::Audio("capture buffer poisoned".to_string()))?;
            if buf.len() >= len {
                return Ok(buf.drain(..len).collect());
            }
        }
        std::thread::sleep(READ_POLL);
    }
}

/// Convert i16 samples to WAV bytes for the STT upload
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
