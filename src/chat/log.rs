use super::entry::ChatEntry;

/// Insertion-ordered history of one conversation
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    sip_address: String,
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    pub fn new(sip_address: impl Into<String>) -> Self {
        Self {
            sip_address: sip_address.into(),
            entries: Vec::new(),
        }
    }

    pub fn sip_address(&self) -> &str {
        &self.sip_address
    }

    /// Appends an entry and returns its index
    pub fn push(&mut self, entry: ChatEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<ChatEntry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ChatEntry> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
