//! Send pipeline: optimistic local append, then remote or cache persistence.

use crate::controller::SyncController;
use crate::error::{Result, SdkError};
use crate::events::{Notice, SessionEvent};
use parley_core::{Author, Message, Payload, RemoteRecord};

/// Reject payloads the composer would never submit.
pub fn validate_payload(payload: &Payload, max_text_len: usize) -> Result<()> {
    match payload {
        Payload::Text { text } => {
            if text.trim().is_empty() {
                return Err(SdkError::EmptyMessage);
            }
        }
        Payload::Image { uri, .. } => {
            if uri.trim().is_empty() {
                return Err(SdkError::EmptyMessage);
            }
        }
        Payload::Location { point, .. } => {
            if !point.is_valid() {
                return Err(SdkError::InvalidLocation {
                    latitude: point.latitude,
                    longitude: point.longitude,
                });
            }
        }
    }

    let len = payload.body().chars().count();
    if len > max_text_len {
        return Err(SdkError::MessageTooLong {
            len,
            max: max_text_len,
        });
    }
    Ok(())
}

impl SyncController {
    /// Send a message authored by `author_id`.
    ///
    /// The message is at the head of the list when this returns, whatever
    /// happens to its persistence afterwards. While live it is published to
    /// the channel; otherwise the whole list is written to the cache. Neither
    /// path rolls back or retries.
    pub fn send(&mut self, author_id: &str, author_name: &str, payload: Payload) -> Result<Message> {
        if self.is_torn_down() {
            return Err(SdkError::SessionClosed);
        }
        validate_payload(&payload, self.max_text_len())?;

        let message = Message::compose(Author::new(author_id, author_name), payload);
        self.messages_mut().prepend(message.clone());
        self.emit(SessionEvent::MessagesChanged {
            count: self.messages().len(),
        });
        tracing::debug!(
            id = %message.id(),
            kind = message.payload().kind(),
            mode = %self.sync_mode(),
            "Message appended"
        );

        if self.sync_mode().is_live() {
            self.publish(&message);
        } else {
            self.persist();
        }
        Ok(message)
    }

    fn publish(&mut self, message: &Message) {
        let record = RemoteRecord::from_message(message);
        let channel = self.channel();
        let events = self.event_sender();
        let local_id = message.id().clone();

        self.spawn_tracked(async move {
            match channel.publish(record).await {
                Ok(document) => {
                    tracing::debug!(local = %local_id, %document, "Message published")
                }
                Err(e) => {
                    tracing::warn!(local = %local_id, error = %e, "Failed to publish message");
                    let _ = events.send(SessionEvent::Notice(Notice::send_failed()));
                }
            }
        });
    }
}
