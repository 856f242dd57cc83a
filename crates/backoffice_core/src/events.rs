//! Events published by list screens to whatever renders them.

use chrono::{DateTime, Utc};
use shared::{domain::Resource, protocol::ImportSummary};

use crate::{normalize::ListResult, reorder::ReorderRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Non-blocking toast-style message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }
}

#[derive(Debug, Clone)]
pub enum ScreenEvent {
    ListUpdated {
        resource: Resource,
        result: ListResult,
    },
    Notification(Notification),
    /// The session token was rejected; the auth layer has to take over.
    AuthRequired {
        resource: Resource,
        message: String,
    },
    SequenceUpdated {
        resource: Resource,
        request: ReorderRequest,
    },
    ImportFinished {
        resource: Resource,
        summary: ImportSummary,
    },
}
