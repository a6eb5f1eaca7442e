//! Bounded chat history.
//!
//! An ordered, mutex-protected list with FIFO eviction once the
//! configured capacity is reached. The server keeps the room history
//! (capacity [`crate::SERVER_HISTORY_CAPACITY`]); the client keeps its
//! own window ([`crate::CLIENT_HISTORY_CAPACITY`]).

use std::collections::VecDeque;

use parking_lot::Mutex;

/// One chat message as seen by history and the `INIT` snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sender's username.
    pub username: String,
    /// Message plaintext.
    pub text: String,
    /// Milliseconds since the Unix epoch, assigned by the server.
    pub timestamp_ms: i64,
}

/// Ordered message history bounded to a fixed capacity.
pub struct MessageHistory {
    entries: Mutex<VecDeque<ChatMessage>>,
    capacity: usize,
}

impl MessageHistory {
    /// Create an empty history that holds at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a message, evicting the oldest entry at capacity.
    pub fn push(&self, message: ChatMessage) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(message);
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop all retained messages.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(n: usize) -> ChatMessage {
        ChatMessage {
            username: "alice".into(),
            text: format!("message {}", n),
            timestamp_ms: n as i64,
        }
    }

    #[test]
    fn test_push_and_snapshot_order() {
        let history = MessageHistory::new(10);
        for n in 0..3 {
            history.push(msg(n));
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].text, "message 0");
        assert_eq!(snapshot[2].text, "message 2");
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let capacity = 5;
        let extra = 3;
        let history = MessageHistory::new(capacity);

        for n in 0..capacity + extra {
            history.push(msg(n));
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), capacity);
        // Exactly the most recent entries remain, in insertion order.
        for (i, entry) in snapshot.iter().enumerate() {
            assert_eq!(entry.text, format!("message {}", extra + i));
        }
    }

    #[test]
    fn test_clear() {
        let history = MessageHistory::new(4);
        history.push(msg(1));
        assert!(!history.is_empty());
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }
}
