use uuid::Uuid;

use crate::common::{ChatMessage, SenderType};

/// Delivery state of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Inserted locally, waiting for the server.
    Pending,
    Confirmed,
    /// The send failed; the entry stays visible.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub message: ChatMessage,
    pub delivery: Delivery,
}

/// What happened to a message pushed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Matched and confirmed a pending local entry.
    Acknowledged(Uuid),
    /// New message appended to the transcript.
    Appended,
    /// Already present under the same server id.
    Duplicate,
}

/// Ordered, de-duplicated transcript of one chat session.
///
/// Entries are kept in non-decreasing timestamp order and are never removed.
#[derive(Debug, Clone)]
pub struct Transcript {
    owner: SenderType,
    chat_id: Option<String>,
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(owner: SenderType) -> Self {
        Self {
            owner,
            chat_id: None,
            entries: Vec::new(),
        }
    }

    pub fn owner(&self) -> SenderType {
        self.owner
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    /// Records the server-assigned session id. The first id wins.
    pub fn assign_chat_id(&mut self, chat_id: &str) -> bool {
        if self.chat_id.is_some() || chat_id.is_empty() {
            return false;
        }
        self.chat_id = Some(chat_id.to_string());
        true
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Owned copy of every entry, for handing to the view.
    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.delivery == Delivery::Pending)
    }

    /// Unread messages written by the other side.
    pub fn unread_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.message.sender_type != self.owner && !entry.message.read)
            .count()
    }

    /// Merges stored history. Messages already known, or matching a pending entry,
    /// are not inserted twice.
    pub fn load_history(&mut self, chat_id: &str, history: Vec<ChatMessage>) {
        self.assign_chat_id(chat_id);
        for message in history {
            self.apply_server_message(message);
        }
    }

    /// Appends a message that has not reached the server yet and returns its temporary id.
    pub fn insert_optimistic(&mut self, mut message: ChatMessage) -> Uuid {
        let client_id = *message.client_id.get_or_insert_with(Uuid::new_v4);
        message.id = None;
        message.read = false;
        self.insert_ordered(TranscriptEntry {
            message,
            delivery: Delivery::Pending,
        });
        client_id
    }

    pub fn apply_server_message(&mut self, message: ChatMessage) -> Reconciled {
        if let Some(id) = message.id.as_deref() {
            if self
                .entries
                .iter()
                .any(|entry| entry.message.id.as_deref() == Some(id))
            {
                return Reconciled::Duplicate;
            }
        }

        if let Some(index) = self.find_pending_match(&message) {
            let entry = self.entries.remove(index);
            let client_id = entry.message.client_id.unwrap_or_else(Uuid::new_v4);
            let mut confirmed = message;
            confirmed.client_id = Some(client_id);
            self.insert_ordered(TranscriptEntry {
                message: confirmed,
                delivery: Delivery::Confirmed,
            });
            return Reconciled::Acknowledged(client_id);
        }

        self.insert_ordered(TranscriptEntry {
            message,
            delivery: Delivery::Confirmed,
        });
        Reconciled::Appended
    }

    pub fn mark_failed(&mut self, client_id: Uuid) -> bool {
        match self.entries.iter_mut().find(|entry| {
            entry.delivery == Delivery::Pending && entry.message.client_id == Some(client_id)
        }) {
            Some(entry) => {
                entry.delivery = Delivery::Failed;
                true
            }
            None => false,
        }
    }

    /// Flags every counterparty message as read. Returns how many changed.
    pub fn mark_all_read(&mut self) -> usize {
        let owner = self.owner;
        let mut changed = 0;
        for entry in &mut self.entries {
            if entry.message.sender_type != owner && !entry.message.read {
                entry.message.read = true;
                changed += 1;
            }
        }
        changed
    }

    /// Entry confirmed by `message`: same temporary id, or for echoes that lost it, the
    /// oldest own-side entry with identical text. Pending entries are preferred over
    /// failed ones, since only a live send can produce an echo.
    fn find_pending_match(&self, message: &ChatMessage) -> Option<usize> {
        if let Some(client_id) = message.client_id {
            return self.entries.iter().position(|entry| {
                entry.delivery != Delivery::Confirmed && entry.message.client_id == Some(client_id)
            });
        }
        if message.sender_type != self.owner {
            return None;
        }
        let same_text = |entry: &TranscriptEntry, delivery: Delivery| {
            entry.delivery == delivery
                && entry.message.sender_type == message.sender_type
                && entry.message.message == message.message
        };
        self.entries
            .iter()
            .position(|entry| same_text(entry, Delivery::Pending))
            .or_else(|| {
                self.entries
                    .iter()
                    .position(|entry| same_text(entry, Delivery::Failed))
            })
    }

    fn insert_ordered(&mut self, entry: TranscriptEntry) {
        let timestamp = entry.message.timestamp;
        let index = self
            .entries
            .partition_point(|existing| existing.message.timestamp <= timestamp);
        self.entries.insert(index, entry);
    }
}
