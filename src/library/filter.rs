use tracing::debug;

use crate::models::{normalize_filter_text, Entry};

/// Text filter over the live collection. Never mutates it.
#[derive(Debug, Clone, Default)]
pub struct FilterView {
    text: String,
    needle: String,
}

impl FilterView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Set the filter text. Returns false when the trimmed text is unchanged.
    pub fn set_text(&mut self, text: &str) -> bool {
        let stripped = text.trim();
        if stripped == self.text {
            return false;
        }

        debug!(filter = %stripped, "Filtering library");
        self.text = stripped.to_string();
        self.needle = normalize_filter_text(stripped);
        true
    }

    pub fn is_visible(&self, entry: &Entry) -> bool {
        entry.matches(&self.needle)
    }

    /// Indices of the visible entries, in collection order.
    pub fn visible_indices(&self, entries: &[Entry]) -> Vec<usize> {
        entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| self.is_visible(entry))
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::Placeholders;
    use crate::library::StoreBuilder;
    use crate::models::{LocationListing, SourceRecord};

    fn entries() -> Vec<Entry> {
        let mut listing = LocationListing::new("root");
        listing.albums = vec![
            SourceRecord::new("a1", "Kind of Blue").with_artist("Miles Davis"),
            SourceRecord::new("a2", "A Love Supreme").with_artist("John Coltrane"),
        ];
        listing.tracks = vec![SourceRecord::new("t1", "Blue in Green")];
        StoreBuilder::build(&listing, &Placeholders::new(8)).entries
    }

    #[test]
    fn test_empty_filter_shows_everything() {
        let filter = FilterView::new();
        assert_eq!(filter.visible_indices(&entries()), vec![0, 1, 2]);
    }

    #[test]
    fn test_case_insensitive_primary_match() {
        let mut filter = FilterView::new();
        filter.set_text("BLUE");
        assert_eq!(filter.visible_indices(&entries()), vec![0, 2]);
    }

    #[test]
    fn test_secondary_match() {
        let mut filter = FilterView::new();
        filter.set_text("coltrane");
        assert_eq!(filter.visible_indices(&entries()), vec![1]);
    }

    #[test]
    fn test_same_text_is_idempotent() {
        let entries = entries();
        let mut filter = FilterView::new();

        assert!(filter.set_text("miles"));
        let first = filter.visible_indices(&entries);
        assert!(!filter.set_text("  miles "));
        assert_eq!(filter.visible_indices(&entries), first);
    }

    #[test]
    fn test_clearing_restores_full_order() {
        let entries = entries();
        let mut filter = FilterView::new();
        filter.set_text("supreme");
        assert_eq!(filter.visible_indices(&entries), vec![1]);

        assert!(filter.set_text(""));
        assert_eq!(filter.visible_indices(&entries), vec![0, 1, 2]);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let mut filter = FilterView::new();
        filter.set_text("(.*)");
        assert!(filter.visible_indices(&entries()).is_empty());
    }
}
