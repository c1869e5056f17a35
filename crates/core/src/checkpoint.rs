//! Persistence of conversations between turns.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::conversation::Conversation;

/// A checkpoint could not be loaded or saved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    message: String,
}

impl Error {
    /// Creates an error with the given message.
    #[inline]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "checkpoint error: {}", self.message)
    }
}

impl StdError for Error {}

/// Stores the conversation of every thread between turns.
///
/// The agent saves a checkpoint only when the conversation is consistent,
/// so implementations can store each snapshot as a whole.
#[async_trait]
pub trait CheckpointStore: Send + Sync + 'static {
    /// Loads the conversation of a thread. Unknown threads yield an empty
    /// conversation.
    async fn load(&self, thread_id: &str) -> Result<Conversation, Error>;

    /// Replaces the stored conversation of a thread.
    async fn save(
        &self,
        thread_id: &str,
        conversation: &Conversation,
    ) -> Result<(), Error>;
}

/// A checkpoint store that keeps everything in memory, all threads are
/// lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    threads: RwLock<HashMap<String, Conversation>>,
}

impl MemoryCheckpointStore {
    /// Returns the number of threads stored.
    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Conversation, Error> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned().unwrap_or_default())
    }

    async fn save(
        &self,
        thread_id: &str,
        conversation: &Conversation,
    ) -> Result<(), Error> {
        trace!(
            "saving {} messages for thread {thread_id}",
            conversation.len()
        );
        let mut threads = self.threads.write().await;
        threads.insert(thread_id.to_owned(), conversation.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use gym_agent_model::ModelMessage;

    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCheckpointStore::default();
        assert!(store.load("t1").await.unwrap().is_empty());

        let mut conversation = Conversation::default();
        conversation
            .push(ModelMessage::User("Do you ship to Pokhara?".to_owned()))
            .unwrap();
        store.save("t1", &conversation).await.unwrap();

        assert_eq!(store.load("t1").await.unwrap(), conversation);
        assert!(store.load("t2").await.unwrap().is_empty());
        assert_eq!(store.thread_count().await, 1);
    }
}
