use crate::Entry;

/// Optional per-kind hooks around persistence and retrieval.
///
/// Most kinds do NOT need this; the pipeline and paginator work from the
/// `KindSchema` alone. Register a handler only for:
/// - Input validation before a write (e.g. required features)
/// - Post-load enrichment of returned entries (computed or templated fields)
pub trait EntryHandler: Send + Sync {
    /// Validate an entry before it is persisted.
    /// Return `Err(message)` to reject the write.
    fn validate(&self, entry: &Entry) -> Result<(), String> {
        let _ = entry;
        Ok(())
    }

    /// Called after loading an entry from the backend, before returning it
    /// to the caller.
    fn on_after_load(&self, entry: &mut Entry) {
        let _ = entry;
    }
}
