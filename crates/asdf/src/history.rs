//! `history/extensions` bookkeeping: the record of which extensions
//! actually fired while converting a document, written back into the tree
//! on `write` so a later reader can tell whether it has everything it
//! needs to fully materialize the file.

/// One extension's footprint in a single write: its identity plus whether
/// the reading/writing engine itself recognized every tag it used (always
/// `true` for this engine's own extensions, `false` only when replaying a
/// foreign extension's record forward unchanged).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRecord {
    /// Extension name, as declared by its manifest or builder.
    pub name: String,
    /// Extension version at the time it converted this document.
    pub version: (u64, u64, u64),
    /// Software name/version of the engine that performed the write.
    pub software: String,
}

/// Accumulates [`ExtensionRecord`]s during a `write`, deduplicated by name
/// (the most recently observed version for a given extension wins, since a
/// document is written by one engine invocation at a time).
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<ExtensionRecord>,
}

impl History {
    /// An empty history, as for a document with no extension-backed
    /// objects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name`/`version` fired during this write.
    pub fn record(&mut self, name: &str, version: (u64, u64, u64)) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == name) {
            existing.version = version;
            return;
        }
        self.entries.push(ExtensionRecord { name: name.to_string(), version, software: env!("CARGO_PKG_NAME").to_string() });
    }

    /// Every extension recorded so far, in first-use order.
    pub fn entries(&self) -> &[ExtensionRecord] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_deduplicate_by_name_keeping_latest_version() {
        let mut history = History::new();
        history.record("asdf.extensions.core", (1, 0, 0));
        history.record("asdf.extensions.core", (1, 1, 0));
        assert_eq!(history.entries().len(), 1);
        assert_eq!(history.entries()[0].version, (1, 1, 0));
    }
}
