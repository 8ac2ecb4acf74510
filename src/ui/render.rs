use crate::catalog::{Product, Review, average_rating};
use crate::chat::{ConnectionState, Delivery, TranscriptEntry};
use crate::common::SenderType;

use super::state::{Level, Notification};

pub fn product_line(product: &Product) -> String {
    let summary = product.summary();
    let price = summary
        .price
        .map(|price| format!("${price:.2}"))
        .unwrap_or_else(|| "n/a".to_string());
    let mut line = format!("{:<33} {:>10}  ★ {:.1}", summary.title, price, summary.rating);

    // Strike-through list price when discounted
    if let Some(size) = product.primary_size_variant() {
        if let (Some(list), Some(_)) = (size.price, size.discount_price) {
            line.push_str(&format!("  (was ${list:.2})"));
        }
    }
    line.push_str(&format!("  [{}]", summary.id));
    line
}

pub fn chat_line(entry: &TranscriptEntry) -> String {
    let message = &entry.message;
    let sender = match message.sender_type {
        SenderType::User => "You",
        SenderType::Admin => "Support",
    };
    let time = message.timestamp.format("%H:%M");
    let marker = match entry.delivery {
        Delivery::Pending => " (sending)",
        Delivery::Failed => " (not sent)",
        Delivery::Confirmed => "",
    };
    format!("[{time}] {sender}: {}{marker}", message.message)
}

/// Lines for entries that are new in `current`, or that failed since `previous`.
/// Entries are matched by temporary id, then by server id, so out-of-order
/// inserts are still picked up.
pub fn transcript_changes(previous: &[TranscriptEntry], current: &[TranscriptEntry]) -> Vec<String> {
    current
        .iter()
        .filter(|entry| match previous.iter().find(|old| same_entry(old, entry)) {
            None => true,
            Some(old) => entry.delivery == Delivery::Failed && old.delivery != Delivery::Failed,
        })
        .map(chat_line)
        .collect()
}

fn same_entry(a: &TranscriptEntry, b: &TranscriptEntry) -> bool {
    match (a.message.client_id, b.message.client_id) {
        (Some(left), Some(right)) => left == right,
        _ => a.message.id.is_some() && a.message.id == b.message.id,
    }
}

pub fn connection_line(state: ConnectionState) -> String {
    match state {
        ConnectionState::Disconnected => "offline".to_string(),
        ConnectionState::Connecting { attempt } => format!("connecting (attempt {attempt})..."),
        ConnectionState::Connected => "online".to_string(),
        ConnectionState::Unavailable => "chat unavailable".to_string(),
    }
}

pub fn review_line(review: &Review) -> String {
    let stars = "★".repeat(review.rating.min(5) as usize);
    let author = review
        .user
        .as_ref()
        .and_then(|user| user.name.as_deref())
        .unwrap_or("Anonymous");
    format!("{stars:<5} {author}: {}", review.comment)
}

pub fn reviews_summary(reviews: &[&Review]) -> String {
    match average_rating(reviews) {
        Some(avg) => format!("{avg:.1} out of 5 ({} reviews)", reviews.len()),
        None => "No reviews yet".to_string(),
    }
}

pub fn notification_line(notification: &Notification) -> String {
    let tag = match notification.level {
        Level::Info => "info",
        Level::Error => "error",
    };
    format!(
        "[{}] {tag}: {}",
        notification.timestamp.format("%H:%M:%S"),
        notification.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SizeVariant, Variant};
    use crate::common::ChatMessage;
    use chrono::{TimeZone, Utc};

    #[test]
    fn product_line_shows_discount() {
        let product = Product {
            id: "p1".into(),
            title: "Linen Shirt".into(),
            rating: Some(4.25),
            variants: vec![Variant {
                size_variants: vec![SizeVariant {
                    price: Some(50.0),
                    discount_price: Some(40.0),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let line = product_line(&product);
        assert!(line.contains("$40.00"));
        assert!(line.contains("(was $50.00)"));
        assert!(line.ends_with("[p1]"));
    }

    fn entry(id: Option<&str>, text: &str, sender: SenderType, delivery: Delivery) -> TranscriptEntry {
        let mut message = ChatMessage::optimistic(text, sender);
        message.id = id.map(str::to_string);
        if sender == SenderType::Admin {
            message.client_id = None;
        }
        TranscriptEntry { message, delivery }
    }

    #[test]
    fn delivery_state_is_shown() {
        let mut pending = entry(None, "hi", SenderType::User, Delivery::Pending);
        pending.message.timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap();
        assert_eq!(chat_line(&pending), "[09:05] You: hi (sending)");

        let mut failed = pending.clone();
        failed.delivery = Delivery::Failed;
        assert_eq!(chat_line(&failed), "[09:05] You: hi (not sent)");

        let mut confirmed = pending;
        confirmed.message.id = Some("m1".into());
        confirmed.delivery = Delivery::Confirmed;
        assert_eq!(chat_line(&confirmed), "[09:05] You: hi");
    }

    #[test]
    fn changes_follow_identity_not_position() {
        let mine = entry(None, "order?", SenderType::User, Delivery::Pending);
        let later = entry(Some("a2"), "later", SenderType::Admin, Delivery::Confirmed);
        let previous = vec![mine.clone(), later.clone()];

        // an earlier-stamped reply lands in front; confirmation of mine is not reprinted
        let early = entry(Some("a1"), "early", SenderType::Admin, Delivery::Confirmed);
        let mut confirmed = mine.clone();
        confirmed.message.id = Some("m1".into());
        confirmed.delivery = Delivery::Confirmed;
        let current = vec![early, confirmed, later];

        let lines = transcript_changes(&previous, &current);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Support: early"));

        let mut failed = mine.clone();
        failed.delivery = Delivery::Failed;
        let lines = transcript_changes(&[mine], &[failed]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("(not sent)"));
    }

    #[test]
    fn connection_labels() {
        assert_eq!(
            connection_line(ConnectionState::Connecting { attempt: 2 }),
            "connecting (attempt 2)..."
        );
        assert_eq!(connection_line(ConnectionState::Unavailable), "chat unavailable");
    }
}
