pub mod connection;
pub mod transcript;

pub use connection::{ConnectionState, ConnectionTracker, NextStep, ReconnectPolicy};
pub use transcript::{Delivery, Reconciled, Transcript, TranscriptEntry};
