//! Wake word monitoring
//!
//! The acoustic detector is an opaque collaborator behind the
//! [`KeywordSpotter`] trait: fixed-size mono frames in, a keyword match index
//! (or -1) out. The shipped [`EnergySpotter`] scores a match when speech
//! energy is sustained long enough; a vendor keyword engine can be dropped in
//! behind the same seam.

use crate::voice::capture::{AudioCapture, SAMPLE_RATE};
use crate::{Error, Result};

/// Fixed frame length the spotter consumes (32ms at 16kHz)
pub const FRAME_LENGTH: usize = 512;

/// Minimum normalized RMS energy to consider a frame speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Consecutive speech frames required before a match (~320ms)
const MIN_ACTIVE_FRAMES: usize = 10;

/// Acoustic keyword detector contract
///
/// `process` consumes exactly one fixed-size frame and returns the index of
/// the matched keyword, or -1 when nothing matched in that frame.
pub trait KeywordSpotter {
    /// Required frame length in samples
    fn frame_length(&self) -> usize;

    /// Required sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Process one frame; returns matched keyword index or -1
    ///
    /// # Errors
    ///
    /// Returns error if the frame does not match the required length. This is
    /// a configuration error, not a transient condition.
    fn process(&mut self, frame: &[i16]) -> Result<i32>;

    /// Discard accumulated detection state
    fn reset(&mut self);
}

/// Energy-based keyword spotter
///
/// Scores a match once frame energy stays above a threshold for a minimum
/// run of consecutive frames. Single keyword, so a match is always index 0.
pub struct EnergySpotter {
    threshold: f32,
    active_frames: usize,
}

impl EnergySpotter {
    /// Create a spotter with the default threshold
    #[must_use]
    pub const fn new() -> Self {
        Self::with_threshold(ENERGY_THRESHOLD)
    }

    /// Create a spotter with a custom energy threshold
    #[must_use]
    pub const fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            active_frames: 0,
        }
    }
}

impl Default for EnergySpotter {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordSpotter for EnergySpotter {
    fn frame_length(&self) -> usize {
        FRAME_LENGTH
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn process(&mut self, frame: &[i16]) -> Result<i32> {
        if frame.len() != FRAME_LENGTH {
            return Err(Error::WakeWord(format!(
                "spotter requires frames of {} samples, got {}",
                FRAME_LENGTH,
                frame.len()
            )));
        }

        let energy = calculate_energy(frame);
        if energy > self.threshold {
            self.active_frames += 1;
            tracing::trace!(energy, run = self.active_frames, "speech frame");
        } else {
            self.active_frames = 0;
        }

        if self.active_frames >= MIN_ACTIVE_FRAMES {
            self.active_frames = 0;
            return Ok(0);
        }

        Ok(-1)
    }

    fn reset(&mut self) {
        self.active_frames = 0;
    }
}

/// Polls an audio frame source and reports whether the wake word was heard
pub struct WakeWordMonitor<S = EnergySpotter> {
    spotter: S,
}

impl<S: KeywordSpotter> WakeWordMonitor<S> {
    /// Create a monitor around a spotter
    ///
    /// # Errors
    ///
    /// Returns error if the spotter's required sample rate does not match the
    /// capture rate — a fatal configuration mismatch.
    pub fn new(spotter: S) -> Result<Self> {
        if spotter.sample_rate() != SAMPLE_RATE {
            return Err(Error::Config(format!(
                "spotter requires {}Hz audio but capture runs at {}Hz",
                spotter.sample_rate(),
                SAMPLE_RATE
            )));
        }

        tracing::debug!(
            frame_length = spotter.frame_length(),
            sample_rate = spotter.sample_rate(),
            "wake word monitor initialized"
        );

        Ok(Self { spotter })
    }

    /// Consume one frame from the capture buffer and report a wake word match
    ///
    /// Blocks until one fixed-size frame is available. Returns true iff the
    /// spotter's match score for that frame is non-negative.
    ///
    /// # Errors
    ///
    /// Returns error if the frame read fails; no retry is attempted.
    pub fn detect(&mut self, capture: &AudioCapture) -> Result<bool> {
        let frame = capture.read_frame(self.spotter.frame_length())?;
        Ok(self.spotter.process(&frame)? >= 0)
    }

    /// Discard accumulated spotter state
    pub fn reset(&mut self) {
        self.spotter.reset();
    }
}

/// Calculate normalized RMS energy of i16 samples
#[allow(clippy::cast_precision_loss)]
pub(crate) fn calculate_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let f = f32::from(s) / 32768.0;
            f * f
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud_frame() -> Vec<i16> {
        vec![16000; FRAME_LENGTH]
    }

    fn silent_frame() -> Vec<i16> {
        vec![0; FRAME_LENGTH]
    }

    #[test]
    fn energy_calculation() {
        assert!(calculate_energy(&silent_frame()) < 0.001);
        assert!(calculate_energy(&loud_frame()) > 0.4);
        assert!((calculate_energy(&[]) - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn silence_never_matches() {
        let mut spotter = EnergySpotter::new();
        for _ in 0..100 {
            assert_eq!(spotter.process(&silent_frame()).unwrap(), -1);
        }
    }

    #[test]
    fn sustained_speech_matches_once() {
        let mut spotter = EnergySpotter::new();

        let mut matches = 0;
        for _ in 0..MIN_ACTIVE_FRAMES {
            if spotter.process(&loud_frame()).unwrap() >= 0 {
                matches += 1;
            }
        }
        assert_eq!(matches, 1);

        // Run counter reset after the match; the next frame alone can't match
        assert_eq!(spotter.process(&loud_frame()).unwrap(), -1);
    }

    #[test]
    fn silence_resets_run() {
        let mut spotter = EnergySpotter::new();

        for _ in 0..(MIN_ACTIVE_FRAMES - 1) {
            assert_eq!(spotter.process(&loud_frame()).unwrap(), -1);
        }
        assert_eq!(spotter.process(&silent_frame()).unwrap(), -1);
        assert_eq!(spotter.process(&loud_frame()).unwrap(), -1);
    }

    #[test]
    fn wrong_frame_length_is_fatal() {
        let mut spotter = EnergySpotter::new();
        let short = vec![0i16; FRAME_LENGTH - 1];
        assert!(matches!(
            spotter.process(&short),
            Err(crate::Error::WakeWord(_))
        ));
    }

    #[test]
    fn reset_clears_run() {
        let mut spotter = EnergySpotter::new();
        for _ in 0..(MIN_ACTIVE_FRAMES - 1) {
            spotter.process(&loud_frame()).unwrap();
        }
        spotter.reset();
        assert_eq!(spotter.process(&loud_frame()).unwrap(), -1);
    }

    #[test]
    fn monitor_rejects_mismatched_sample_rate() {
        struct OddSpotter;
        impl KeywordSpotter for OddSpotter {
            fn frame_length(&self) -> usize {
                FRAME_LENGTH
            }
            fn sample_rate(&self) -> u32 {
                44_100
            }
            fn process(&mut self, _frame: &[i16]) -> Result<i32> {
                Ok(-1)
            }
            fn reset(&mut self) {}
        }

        assert!(matches!(
            WakeWordMonitor::new(OddSpotter),
            Err(crate::Error::Config(_))
        ));
    }
}
