//! Filtered and windowed view over a conversation log.
//!
//! The view is built from two stages applied to a log snapshot:
//!
//! 1. [`filter_entries`] keeps the entries accepted by the active
//!    [`EntryFilter`], in log order.
//! 2. [`window_range`] keeps the last `max_displayed_entries` of those.
//!
//! [`ChatProxyModel`] owns only the state of these stages (filter, window size
//! and the derived index cache). The entries themselves stay in the
//! [`ChatLog`].

use std::ops::Range;

use log::debug;

use super::entry::{ChatEntry, EntryFilter};
use super::log::ChatLog;

/// Window growth for one explicit "load more" request
pub const ENTRIES_CHUNK_SIZE: usize = 50;

/// Notifications emitted by [`ChatProxyModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyEvent {
    /// `n` older rows became visible
    MoreEntriesLoaded(usize),
    EntryFilterChanged(EntryFilter),
}

/// Positions in `entries` accepted by `filter`, in log order
pub fn filter_entries(entries: &[ChatEntry], filter: EntryFilter) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| filter.accepts(entry))
        .map(|(index, _)| index)
        .collect()
}

/// Filtered positions exposed by a window of `window` rows
pub fn window_range(filtered_len: usize, window: usize) -> Range<usize> {
    filtered_len.saturating_sub(window)..filtered_len
}

/// A filtered position is visible when it is one of the last `window` ones
pub fn is_row_visible(filtered_len: usize, row: usize, window: usize) -> bool {
    row < filtered_len && filtered_len - row <= window
}

#[derive(Debug, Clone)]
pub struct ChatProxyModel {
    filter: EntryFilter,
    max_displayed_entries: usize,
    // Log indices of the accepted entries
    filtered: Vec<usize>,
    // Log length covered by `filtered`
    synced_len: usize,
}

impl ChatProxyModel {
    pub fn new(log: &ChatLog) -> Self {
        let mut model = Self {
            filter: EntryFilter::All,
            max_displayed_entries: ENTRIES_CHUNK_SIZE,
            filtered: Vec::new(),
            synced_len: 0,
        };
        model.invalidate(log);
        model
    }

    pub fn entry_filter(&self) -> EntryFilter {
        self.filter
    }

    pub fn max_displayed_entries(&self) -> usize {
        self.max_displayed_entries
    }

    /// Number of entries accepted by the filter
    pub fn available_count(&self) -> usize {
        self.filtered.len()
    }

    /// Number of rows exposed to the view
    pub fn row_count(&self) -> usize {
        self.visible().len()
    }

    fn visible(&self) -> &[usize] {
        &self.filtered[window_range(self.filtered.len(), self.max_displayed_entries)]
    }

    /// Recomputes the filter stage from scratch
    pub fn invalidate(&mut self, log: &ChatLog) {
        self.filtered = filter_entries(log.entries(), self.filter);
        self.synced_len = log.len();
    }

    pub fn set_entry_filter(&mut self, filter: EntryFilter, log: &ChatLog) -> Option<ProxyEvent> {
        if self.filter == filter {
            return None;
        }

        debug!("Chat filter of {} changed to {:?}", log.sip_address(), filter);
        self.filter = filter;
        self.invalidate(log);
        Some(ProxyEvent::EntryFilterChanged(filter))
    }

    pub fn load_more_entries(&mut self, log: &ChatLog) -> Option<ProxyEvent> {
        let count = self.row_count();
        if count >= self.available_count() {
            return None;
        }

        // Redundant requests must not grow the window past what is shown.
        if count == self.max_displayed_entries {
            self.max_displayed_entries += ENTRIES_CHUNK_SIZE;
        }

        self.invalidate(log);

        let loaded = self.row_count().saturating_sub(count);
        if loaded > 0 {
            debug!("Loaded {} more entries of {}", loaded, log.sip_address());
            Some(ProxyEvent::MoreEntriesLoaded(loaded))
        } else {
            None
        }
    }

    /// Keeps a newly received or sent entry visible without a "load more"
    pub fn on_entry_appended(&mut self, log: &ChatLog) {
        self.max_displayed_entries += 1;

        if log.len() < self.synced_len {
            self.invalidate(log);
            return;
        }

        for (index, entry) in log.entries().iter().enumerate().skip(self.synced_len) {
            if self.filter.accepts(entry) {
                self.filtered.push(index);
            }
        }
        self.synced_len = log.len();
    }

    /// Resynchronizes after missed notifications. Entries appended since the
    /// last sync grow the window as [`Self::on_entry_appended`] would have.
    pub fn catch_up(&mut self, log: &ChatLog) {
        self.max_displayed_entries += log.len().saturating_sub(self.synced_len);
        self.invalidate(log);
    }

    /// Log index of the exposed row `row`
    pub fn map_to_source(&self, row: usize) -> Option<usize> {
        self.visible().get(row).copied()
    }

    pub fn entry<'a>(&self, log: &'a ChatLog, row: usize) -> Option<&'a ChatEntry> {
        self.map_to_source(row).and_then(|index| log.get(index))
    }

    /// Exposed entries, oldest first
    pub fn rows<'a>(&self, log: &'a ChatLog) -> Vec<&'a ChatEntry> {
        self.visible()
            .iter()
            .filter_map(|index| log.get(*index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::entry::{Direction, EntryKind, EntryPayload};
    use pretty_assertions::assert_eq;

    fn message(n: usize) -> ChatEntry {
        ChatEntry::text(Direction::Incoming, format!("message {}", n))
    }

    fn file(n: usize) -> ChatEntry {
        ChatEntry::new(
            Direction::Outgoing,
            EntryPayload::File {
                name: format!("file-{}.png", n),
                size: 1024,
                url: None,
            },
        )
    }

    fn log_of(count: usize) -> ChatLog {
        let mut log = ChatLog::new("sip:alice@example.org");
        for n in 0..count {
            log.push(message(n));
        }
        log
    }

    fn texts(model: &ChatProxyModel, log: &ChatLog) -> Vec<String> {
        model.rows(log).iter().map(|entry| entry.summary()).collect()
    }

    #[test]
    fn filter_keeps_matching_entries_in_order() {
        let mut log = ChatLog::new("sip:bob@example.org");
        log.push(message(0));
        log.push(file(1));
        log.push(ChatEntry::notice("call ended"));
        log.push(message(3));
        log.push(file(4));

        assert_eq!(filter_entries(log.entries(), EntryFilter::All), vec![0, 1, 2, 3, 4]);
        assert_eq!(
            filter_entries(log.entries(), EntryFilter::Only(EntryKind::FileTransfer)),
            vec![1, 4]
        );
        assert_eq!(
            filter_entries(log.entries(), EntryFilter::Only(EntryKind::Notice)),
            vec![2]
        );
    }

    #[test]
    fn visibility_matches_window_range() {
        for filtered_len in [0, 1, 49, 50, 51, 120] {
            for window in [0, 1, 50, 100] {
                let range = window_range(filtered_len, window);
                assert_eq!(range.len(), filtered_len.min(window));
                for row in 0..filtered_len {
                    assert_eq!(is_row_visible(filtered_len, row, window), range.contains(&row));
                }
            }
        }
    }

    #[test]
    fn exposes_most_recent_entries() {
        let log = log_of(120);
        let model = ChatProxyModel::new(&log);

        assert_eq!(model.row_count(), 50);
        assert_eq!(model.map_to_source(0), Some(70));
        assert_eq!(model.map_to_source(49), Some(119));
        assert_eq!(model.map_to_source(50), None);
    }

    #[test]
    fn load_more_grows_by_chunks_until_exhausted() {
        let log = log_of(120);
        let mut model = ChatProxyModel::new(&log);

        assert_eq!(model.load_more_entries(&log), Some(ProxyEvent::MoreEntriesLoaded(50)));
        assert_eq!(model.max_displayed_entries(), 100);
        assert_eq!(model.map_to_source(0), Some(20));

        assert_eq!(model.load_more_entries(&log), Some(ProxyEvent::MoreEntriesLoaded(20)));
        assert_eq!(model.max_displayed_entries(), 150);
        assert_eq!(model.row_count(), 120);

        assert_eq!(model.load_more_entries(&log), None);
        assert_eq!(model.load_more_entries(&log), None);
        assert_eq!(model.max_displayed_entries(), 150);
    }

    #[test]
    fn load_more_on_short_log_is_noop() {
        let log = log_of(10);
        let mut model = ChatProxyModel::new(&log);

        assert_eq!(model.row_count(), 10);
        assert_eq!(model.load_more_entries(&log), None);
        assert_eq!(model.max_displayed_entries(), ENTRIES_CHUNK_SIZE);
    }

    #[test]
    fn appended_entries_stay_visible() {
        let mut log = log_of(120);
        let mut model = ChatProxyModel::new(&log);

        log.push(message(120));
        model.on_entry_appended(&log);

        assert_eq!(model.max_displayed_entries(), 51);
        assert_eq!(model.row_count(), 51);
        assert_eq!(texts(&model, &log).last().map(String::as_str), Some("message 120"));
        assert_eq!(model.map_to_source(0), Some(70));

        // Window is full again, so the next request grows by a whole chunk.
        assert_eq!(model.load_more_entries(&log), Some(ProxyEvent::MoreEntriesLoaded(50)));
        assert_eq!(model.max_displayed_entries(), 101);
    }

    #[test]
    fn catch_up_keeps_missed_entries_visible() {
        let mut log = log_of(120);
        let mut model = ChatProxyModel::new(&log);

        for n in 120..123 {
            log.push(message(n));
        }
        model.catch_up(&log);

        assert_eq!(model.max_displayed_entries(), 53);
        assert_eq!(model.row_count(), 53);
        assert_eq!(model.map_to_source(0), Some(70));
        assert_eq!(texts(&model, &log).last().map(String::as_str), Some("message 122"));

        // Nothing new since the last sync
        model.catch_up(&log);
        assert_eq!(model.max_displayed_entries(), 53);
    }

    #[test]
    fn appending_grows_window_even_when_filtered_out() {
        let mut log = log_of(5);
        let mut model = ChatProxyModel::new(&log);
        model.set_entry_filter(EntryFilter::Only(EntryKind::FileTransfer), &log);

        log.push(message(5));
        model.on_entry_appended(&log);
        assert_eq!(model.max_displayed_entries(), 51);
        assert_eq!(model.row_count(), 0);

        log.push(file(6));
        model.on_entry_appended(&log);
        assert_eq!(model.max_displayed_entries(), 52);
        assert_eq!(model.map_to_source(0), Some(6));
    }

    #[test]
    fn changing_filter_keeps_window() {
        let mut log = ChatLog::new("sip:carol@example.org");
        for n in 0..60 {
            log.push(message(n));
            log.push(file(n));
        }
        let mut model = ChatProxyModel::new(&log);
        model.load_more_entries(&log);
        assert_eq!(model.max_displayed_entries(), 100);

        let filter = EntryFilter::Only(EntryKind::Message);
        assert_eq!(
            model.set_entry_filter(filter, &log),
            Some(ProxyEvent::EntryFilterChanged(filter))
        );
        assert_eq!(model.max_displayed_entries(), 100);
        assert_eq!(model.available_count(), 60);
        assert_eq!(model.row_count(), 60);
        assert!(model.rows(&log).iter().all(|entry| entry.kind() == EntryKind::Message));

        assert_eq!(model.set_entry_filter(filter, &log), None);
    }

    #[test]
    fn removed_entries_leave_the_view() {
        let mut log = log_of(3);
        let mut model = ChatProxyModel::new(&log);

        let index = model.map_to_source(1).unwrap();
        log.remove(index);
        model.invalidate(&log);
        assert_eq!(texts(&model, &log), vec!["message 0", "message 2"]);

        log.push(message(3));
        model.on_entry_appended(&log);
        assert_eq!(texts(&model, &log), vec!["message 0", "message 2", "message 3"]);
    }
}
