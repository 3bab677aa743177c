use super::ManifestEntry;

/// Manifest entries of one playback session, in manifest order.
///
/// Offsets are seconds relative to the session start; lookups translate them
/// to absolute unix time before matching entry windows.
#[derive(Debug, Default, Clone)]
pub struct ManifestStore {
    session_start: i64,
    entries: Vec<ManifestEntry>,
}

impl ManifestStore {
    #[must_use]
    pub const fn new(session_start: i64) -> Self {
        Self {
            session_start,
            entries: Vec::new(),
        }
    }

    /// First entry whose window contains `session_start + offset`.
    ///
    /// Overlapping windows are not deduplicated; manifest order breaks ties.
    #[must_use]
    pub fn lookup(&self, offset: i64) -> Option<&ManifestEntry> {
        let timestamp = self.session_start.saturating_add(offset);
        self.entries.iter().find(|entry| entry.covers(timestamp))
    }

    /// Like [`Self::lookup`], but only if the matching entry is usable.
    #[must_use]
    pub fn lookup_valid(&self, offset: i64) -> Option<&ManifestEntry> {
        self.lookup(offset).filter(|entry| entry.is_valid())
    }

    #[must_use]
    pub fn is_valid_for(&self, offset: i64) -> bool {
        self.lookup_valid(offset).is_some()
    }

    /// Discard every previous entry and install `entries` as-is.
    pub fn replace_all(&mut self, entries: Vec<ManifestEntry>) {
        self.entries = entries;
    }

    /// Forget all entries and rebase lookups on a new session start.
    pub fn reset(&mut self, session_start: i64) {
        self.session_start = session_start;
        self.entries.clear();
    }

    #[must_use]
    pub const fn session_start(&self) -> i64 {
        self.session_start
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
