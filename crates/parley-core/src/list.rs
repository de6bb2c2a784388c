//! Newest-first message list.

use crate::message::{Message, MessageId};
use serde::{Deserialize, Serialize};

/// Ordered sequence of messages, newest first.
///
/// The list never reorders what it is given: a remote snapshot keeps the
/// server's creation order and a cached list keeps its persisted order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageList {
    messages: Vec<Message>,
}

impl MessageList {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// A list holding only the welcome greeting for `user_name`.
    pub fn welcome(user_name: &str) -> Self {
        Self {
            messages: vec![Message::welcome(user_name)],
        }
    }

    /// Insert a message at the head of the list.
    pub fn prepend(&mut self, message: Message) {
        self.messages.insert(0, message);
    }

    /// Discard the current content in favour of `messages`.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id() == id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_vec(self) -> Vec<Message> {
        self.messages
    }
}

impl From<Vec<Message>> for MessageList {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl FromIterator<Message> for MessageList {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MessageList {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Author, Payload};

    fn msg(text: &str) -> Message {
        Message::compose(Author::new("u1", "Alice"), Payload::text(text))
    }

    #[test]
    fn test_prepend_puts_newest_first() {
        let mut list = MessageList::new();
        list.prepend(msg("one"));
        list.prepend(msg("two"));

        assert_eq!(list.len(), 2);
        assert_eq!(list.first().map(|m| m.text()), Some("two"));
    }

    #[test]
    fn test_replace_discards_previous() {
        let mut list = MessageList::welcome("Alice");
        list.replace(vec![msg("a"), msg("b")]);

        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|m| !m.author().is_system()));
    }

    #[test]
    fn test_lookup_by_id() {
        let m = msg("find me");
        let id = m.id().clone();
        let list: MessageList = vec![msg("x"), m].into();

        assert!(list.contains(&id));
        assert_eq!(list.get(&id).map(|m| m.text()), Some("find me"));
    }
}
