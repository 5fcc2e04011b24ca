//! Auto-clearing status line

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    set_at: Instant,
}

#[derive(Debug)]
pub struct StatusLine {
    message: Option<StatusMessage>,
    timeout: Duration,
}

impl StatusLine {
    pub fn new(timeout: Duration) -> Self {
        Self {
            message: None,
            timeout,
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.set(text.into(), StatusLevel::Info);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.set(text.into(), StatusLevel::Error);
    }

    fn set(&mut self, text: String, level: StatusLevel) {
        self.message = Some(StatusMessage {
            text,
            level,
            set_at: Instant::now(),
        });
    }

    /// Clear the message once it has been shown for the timeout
    pub fn tick(&mut self, now: Instant) {
        if self
            .message
            .as_ref()
            .is_some_and(|m| now.saturating_duration_since(m.set_at) >= self.timeout)
        {
            self.message = None;
        }
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.message.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.message.as_ref().map(|m| m.text.as_str())
    }
}
