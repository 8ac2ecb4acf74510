use crate::chat::{ConnectionState, TranscriptEntry};

/// Events the chat session reports up to the view.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Full ordered transcript, with delivery state, after every change.
    TranscriptUpdated(Vec<TranscriptEntry>),
    ConnectionChanged(ConnectionState),
    /// The session id became known (history load or first send).
    SessionAssigned(String),
    /// Reconnect budget exhausted; the session keeps its transcript and falls back to REST.
    Unavailable { attempts: u32 },
    /// Non-fatal error to show as a transient notification.
    Notice(String),
}
