//! The conversation loop
//!
//! Wires capture, wake monitoring, listening, generation, and playback into
//! the single cooperative loop: wait for the wake word, greet, then exchange
//! turns until the conversation goes quiet for too long.

use crate::config::Config;
use crate::generate::GenerateClient;
use crate::session::{ConversationTurn, LoopState, SessionTimer};
use crate::voice::{
    AudioCapture, CommandListener, EnergySpotter, ListenOutcome, SpeechPlayer, SpeechToText,
    TextToSpeech, WakeWordMonitor,
};
use crate::Result;

/// Voice assistant: owns every stage of the loop
pub struct Assistant {
    config: Config,
    capture: AudioCapture,
    monitor: WakeWordMonitor<EnergySpotter>,
    listener: CommandListener,
    generate: GenerateClient,
    player: SpeechPlayer,
}

impl Assistant {
    /// Build an assistant from configuration
    ///
    /// # Errors
    ///
    /// Returns error if an audio device is missing or a client cannot be
    /// constructed. Startup failures are fatal; there is no degraded mode.
    pub fn new(config: Config) -> Result<Self> {
        let capture = AudioCapture::new()?;
        let monitor = WakeWordMonitor::new(EnergySpotter::new())?;

        let stt = SpeechToText::new(
            config.stt_url.clone(),
            config.api_key.clone(),
            config.stt_model.clone(),
        );
        let listener = CommandListener::new(stt, config.listen_timeout, config.phrase_limit);

        let generate = GenerateClient::new(config.generate_url.clone(), config.model.clone())?;

        let tts = TextToSpeech::new(
            config.tts_url.clone(),
            config.api_key.clone(),
            config.tts_model.clone(),
            config.tts_voice.clone(),
            config.tts_speed,
        );
        let player = SpeechPlayer::new(tts)?;

        Ok(Self {
            config,
            capture,
            monitor,
            listener,
            generate,
            player,
        })
    }

    /// Run the assistant until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if the microphone stream cannot be started or a frame
    /// read fails while idle.
    #[allow(clippy::future_not_send)] // cpal streams are thread-bound
    pub async fn run(&mut self) -> Result<()> {
        self.capture.start()?;

        println!("Voice Assistant Ready!");
        println!("Say '{}' to start a conversation.", self.config.wake_word);
        tracing::info!(wake_word = %self.config.wake_word, "assistant running");

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("shutdown requested");
                    break;
                }
                () = tokio::time::sleep(std::time::Duration::from_millis(1)) => {
                    if self.monitor.detect(&self.capture)? {
                        tracing::info!("wake word detected");
                        self.converse().await;
                        self.monitor.reset();
                        self.capture.clear_buffer();
                    }
                }
            }
        }

        self.capture.stop();
        println!("Goodbye.");
        Ok(())
    }

    /// Hold one conversation: greet, then exchange turns until it goes idle
    ///
    /// Nothing in here is fatal to the outer loop; every failure is logged
    /// and the conversation simply winds down.
    #[allow(clippy::future_not_send)]
    async fn converse(&mut self) {
        tracing::debug!(state = ?LoopState::Greeting, "conversation started");

        let greeting = self.config.greeting.clone();
        println!("\n{greeting}");
        if let Err(e) = self.speak(&greeting).await {
            tracing::error!(error = %e, "greeting playback failed");
        }

        let mut timer = SessionTimer::new(self.config.idle_timeout, self.config.follow_up_notice);

        loop {
            if timer.expired() {
                tracing::info!(idle = ?timer.idle_for(), "conversation expired");
                let standby = self.config.standby.clone();
                println!("{standby}");
                if let Err(e) = self.speak(&standby).await {
                    tracing::error!(error = %e, "standby playback failed");
                }
                break;
            }

            tracing::debug!(state = ?LoopState::AwaitingCommand);
            match self.listener.listen(&self.capture).await {
                ListenOutcome::Heard(utterance) => {
                    timer.record_interaction();
                    println!("\nYou: {utterance}");
                    self.respond(&utterance).await;
                }
                ListenOutcome::Silence | ListenOutcome::Failed(_) => {
                    // Repeated every failed listen while the window is open
                    if timer.should_prompt_follow_up() {
                        println!("Listening for follow-up...");
                        tracing::debug!(idle = ?timer.idle_for(), "follow-up notice");
                    }
                }
            }
        }

        tracing::debug!(state = ?LoopState::Idle, "conversation ended");
    }

    /// Stream a reply for one utterance and speak it sentence by sentence
    #[allow(clippy::future_not_send)]
    async fn respond(&mut self, utterance: &str) {
        tracing::debug!(state = ?LoopState::Responding);
        print!("\nAssistant: ");

        let mut stream = self.generate.stream(utterance);
        let mut reply = String::new();
        let mut interrupted = false;

        while let Some(sentence) = stream.next().await {
            println!("{sentence}");
            if !reply.is_empty() {
                reply.push(' ');
            }
            reply.push_str(&sentence);

            match self.speak(&sentence).await {
                Ok(true) => {
                    interrupted = true;
                    println!("\nSpeech interrupted.");
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, "playback failed, abandoning reply");
                    break;
                }
            }
        }

        let turn = ConversationTurn {
            utterance: utterance.to_string(),
            reply,
            interrupted,
        };
        tracing::info!(
            utterance = %turn.utterance,
            reply_len = turn.reply.len(),
            interrupted = turn.interrupted,
            "turn complete"
        );
    }

    /// Speak one chunk of text; returns true if the wake word interrupted it
    #[allow(clippy::future_not_send)]
    async fn speak(&mut self, text: &str) -> Result<bool> {
        self.player
            .play(text, &mut self.monitor, &self.capture)
            .await
    }
}
