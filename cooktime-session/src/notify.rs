//! Notification sinks
//!
//! The visual half of an alert: a title and a body handed to whatever shows
//! them. The server logs them (SSE clients get the same text through
//! `AlertFired`); the foreground `run` command prints them.

use std::io::Write;

use serde::Serialize;
use tracing::{info, warn};

/// One user-visible alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Consumer of notifications
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, notification: &Notification) {
        info!("{}: {}", notification.title, notification.body.replace('\n', " | "));
    }
}

/// Prints notifications to stdout, ringing the terminal bell
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotificationSink;

impl NotificationSink for ConsoleNotificationSink {
    fn notify(&self, notification: &Notification) {
        let mut out = std::io::stdout().lock();
        let result = writeln!(out, "\x07{}\n  {}", notification.title, notification.body.replace('\n', "\n  "))
            .and_then(|_| out.flush());
        if let Err(e) = result {
            warn!("Failed to print notification: {}", e);
        }
    }
}
