//! Valet - wake-word voice assistant loop
//!
//! This library provides the pieces of the valet assistant:
//! - Audio capture and wake word monitoring
//! - Command listening (cloud STT)
//! - Streamed reply generation, split into sentence fragments
//! - Interruptible speech playback (cloud TTS)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Conversation loop                    │
//! │   Idle → Greeting → AwaitingCommand → Responding    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Wake monitor │ Listener │ Generate │ Player       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Microphone │ STT API │ /api/generate │ TTS API    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod config;
pub mod error;
pub mod generate;
pub mod logging;
pub mod session;
pub mod voice;

pub use assistant::Assistant;
pub use config::Config;
pub use error::{Error, Result};
pub use generate::{GenerateClient, ResponseStream, SentenceSplitter};
pub use session::{ConversationTurn, LoopState, SessionTimer};
