//! Conversation session state
//!
//! Tracks how long a conversation has been idle so the loop knows when to
//! offer a follow-up prompt and when to stand down entirely. Durations are
//! injected so the windows can be tested without wall-clock waits.

use std::time::{Duration, Instant};

/// Phase of the assistant loop, recorded for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the wake word
    Idle,
    /// Acknowledging the wake word
    Greeting,
    /// Listening for a command
    AwaitingCommand,
    /// Generating and speaking a reply
    Responding,
}

/// One completed exchange, recorded for logging
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    /// What the user said
    pub utterance: String,
    /// What the assistant said back
    pub reply: String,
    /// Whether the wake word cut the reply short
    pub interrupted: bool,
}

/// Idle-time tracker for one conversation
///
/// The conversation expires after `idle_timeout` without a command; after
/// `follow_up_notice` of idleness the loop should remind the user it is
/// still listening. Construction requires `follow_up_notice < idle_timeout`,
/// enforced upstream by config validation.
pub struct SessionTimer {
    last_interaction: Instant,
    idle_timeout: Duration,
    follow_up_notice: Duration,
}

impl SessionTimer {
    /// Start a timer; the conversation counts as fresh now
    #[must_use]
    pub fn new(idle_timeout: Duration, follow_up_notice: Duration) -> Self {
        Self {
            last_interaction: Instant::now(),
            idle_timeout,
            follow_up_notice,
        }
    }

    /// Mark a command as heard, restarting the idle window
    pub fn record_interaction(&mut self) {
        self.last_interaction = Instant::now();
    }

    /// Whether the conversation has been idle past the timeout
    #[must_use]
    pub fn expired(&self) -> bool {
        self.idle_for() >= self.idle_timeout
    }

    /// Whether to remind the user the assistant is still listening
    ///
    /// True only in the window between the notice threshold and expiry.
    #[must_use]
    pub fn should_prompt_follow_up(&self) -> bool {
        let idle = self.idle_for();
        idle >= self.follow_up_notice && idle < self.idle_timeout
    }

    /// Time since the last command
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_interaction.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    // Millisecond-scale analogs of the 10s notice / 30s expiry windows.
    const NOTICE: Duration = Duration::from_millis(20);
    const EXPIRY: Duration = Duration::from_millis(60);

    #[test]
    fn fresh_timer_is_live() {
        let timer = SessionTimer::new(EXPIRY, NOTICE);
        assert!(!timer.expired());
        assert!(!timer.should_prompt_follow_up());
    }

    #[test]
    fn notice_window_precedes_expiry() {
        let timer = SessionTimer::new(EXPIRY, NOTICE);

        sleep(NOTICE + Duration::from_millis(5));
        assert!(timer.should_prompt_follow_up());
        assert!(!timer.expired());

        sleep(EXPIRY);
        assert!(timer.expired());
        assert!(!timer.should_prompt_follow_up());
    }

    #[test]
    fn notice_repeats_while_the_window_is_open() {
        let timer = SessionTimer::new(EXPIRY, NOTICE);

        sleep(NOTICE + Duration::from_millis(5));
        assert!(timer.should_prompt_follow_up());

        // A later silent turn inside the same window prompts again; the
        // notice is not latched to fire once per conversation
        sleep(Duration::from_millis(10));
        assert!(timer.should_prompt_follow_up());
    }

    #[test]
    fn interaction_resets_the_window() {
        let mut timer = SessionTimer::new(EXPIRY, NOTICE);

        // A command just before expiry buys a whole new window
        sleep(EXPIRY - Duration::from_millis(10));
        timer.record_interaction();

        sleep(Duration::from_millis(15));
        assert!(!timer.expired());
        assert!(!timer.should_prompt_follow_up());
    }

    #[test]
    fn loop_state_is_comparable() {
        assert_eq!(LoopState::Idle, LoopState::Idle);
        assert_ne!(LoopState::Greeting, LoopState::Responding);
    }

    #[test]
    fn turn_records_interruption() {
        let turn = ConversationTurn {
            utterance: "what time is it".to_string(),
            reply: "It is noon.".to_string(),
            interrupted: true,
        };
        assert!(turn.interrupted);
    }
}
