use cl_domain::chat::ChatEntry;
use cl_domain::error::Result;
use parking_lot::Mutex;

/// Persistent store contract consumed by the agent.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Append one completed entry.
    async fn append(&self, entry: &ChatEntry) -> Result<()>;

    /// All entries in append order.
    async fn load_history(&self) -> Result<Vec<ChatEntry>>;

    /// Drop the whole history.
    async fn clear(&self) -> Result<()>;
}

/// Volatile store, used when persistence is disabled and in tests.
#[derive(Default)]
pub struct MemoryChatStore {
    entries: Mutex<Vec<ChatEntry>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store.
    pub fn with_entries(entries: Vec<ChatEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn snapshot(&self) -> Vec<ChatEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait::async_trait]
impl ChatStore for MemoryChatStore {
    async fn append(&self, entry: &ChatEntry) -> Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    async fn load_history(&self) -> Result<Vec<ChatEntry>> {
        Ok(self.snapshot())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}
