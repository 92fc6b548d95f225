//! Valet binary entry point

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use valet::voice::{
    decode_mp3, AudioCapture, AudioPlayback, TextToSpeech, PLAYBACK_SAMPLE_RATE, SAMPLE_RATE,
};
use valet::{Assistant, Config};

#[derive(Parser)]
#[command(name = "valet", version, about = "Wake-word voice assistant")]
struct Cli {
    /// Wake word that starts a conversation
    #[arg(long, env = "VALET_WAKE_WORD")]
    wake_word: Option<String>,

    /// Generation model identifier
    #[arg(long, env = "VALET_MODEL")]
    model: Option<String>,

    /// Generation endpoint URL
    #[arg(long, env = "VALET_GENERATE_URL")]
    generate_url: Option<String>,

    /// TTS voice identifier
    #[arg(long, env = "VALET_TTS_VOICE")]
    voice: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Record from the microphone and print level readings
    TestMic {
        /// Recording duration in seconds
        #[arg(long, default_value_t = 5)]
        duration: u64,
    },
    /// Play a test tone on the default output device
    TestSpeaker,
    /// Synthesize a phrase and play it
    TestTts {
        /// Text to speak
        #[arg(default_value = "This is a voice synthesis test.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,valet=info",
        1 => "info,valet=debug",
        2 => "debug",
        _ => "trace",
    };
    if let Err(e) = valet::logging::init(filter) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)] // cpal streams are thread-bound
async fn run(cli: Cli) -> valet::Result<()> {
    let mut config = Config::load()?;

    if let Some(wake_word) = cli.wake_word {
        config.wake_word = wake_word;
    }
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(url) = cli.generate_url {
        config.generate_url = url;
    }
    if let Some(voice) = cli.voice {
        config.tts_voice = voice;
    }
    config.validate()?;

    match cli.command {
        Some(Command::TestMic { duration }) => test_mic(duration),
        Some(Command::TestSpeaker) => test_speaker(),
        Some(Command::TestTts { text }) => test_tts(&config, &text).await,
        None => {
            let mut assistant = Assistant::new(config)?;
            assistant.run().await
        }
    }
}

/// Record from the microphone and print a level meter twice per second
fn test_mic(duration: u64) -> valet::Result<()> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Recording for {duration}s, speak now...");

    let chunk = SAMPLE_RATE as usize / 2;
    for _ in 0..(duration * 2) {
        let samples = capture.read_frame(chunk)?;
        let level = rms(&samples);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bar = "#".repeat((level * 200.0).min(40.0) as usize);
        println!("level {level:.4} {bar}");
    }

    capture.stop();
    println!("Microphone test complete.");
    Ok(())
}

/// Play one second of a 440Hz sine tone
fn test_speaker() -> valet::Result<()> {
    let playback = AudioPlayback::new()?;

    println!("Playing test tone...");

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..PLAYBACK_SAMPLE_RATE)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.3
        })
        .collect();

    playback.play_blocking(samples)?;
    println!("Speaker test complete.");
    Ok(())
}

/// Synthesize a phrase and play it to completion
#[allow(clippy::cast_precision_loss)]
async fn test_tts(config: &Config, text: &str) -> valet::Result<()> {
    let tts = TextToSpeech::new(
        config.tts_url.clone(),
        config.api_key.clone(),
        config.tts_model.clone(),
        config.tts_voice.clone(),
        config.tts_speed,
    );

    println!("Synthesizing: {text}");
    let audio = tts.synthesize(text).await?;
    let samples = decode_mp3(&audio)?;

    println!(
        "Playing {:.1}s of audio (voice: {})...",
        samples.len() as f32 / PLAYBACK_SAMPLE_RATE as f32,
        tts.voice()
    );

    let playback = AudioPlayback::new()?;
    playback.play_blocking(samples)?;
    println!("TTS test complete.");
    Ok(())
}

/// Normalized RMS level of i16 samples
#[allow(clippy::cast_precision_loss)]
fn rms(samples: &[i16]) -> f32 {
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
