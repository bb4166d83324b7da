//! Durable conversation storage.
//!
//! One record per conversation, `chat_<id>.dat` in the data directory.
//! Records are serialized as JSON, obfuscated through the configured
//! [`RecordCodec`] and tagged with [`RECORD_MAGIC`]; untagged files are
//! read as legacy plain JSON. Every mutation is a full
//! read-modify-rewrite of the record, no partial-file updates.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::chat::{Conversation, ConversationSummary, Sender, Turn};
use tracing::{debug, warn};

use crate::codec::{RecordCodec, XorObfuscator, RECORD_MAGIC};
use crate::error::{StoreError, StoreResult};

/// Marker carried by every export bundle.
pub const BUNDLE_MAGIC: &str = "ORION_CHAT_EXPORT";

/// Conventional extension for export bundles.
pub const BUNDLE_EXTENSION: &str = "orion";

/// Conditions the store tolerates but reports, so the UI (and tests) can
/// observe them without the operation failing.
#[derive(Debug, Clone)]
pub enum StoreDiagnostic {
    /// A conversation file could not be decoded and was left out of a
    /// listing.
    CorruptRecordSkipped { path: PathBuf, reason: String },
    /// The settings file existed but did not parse; defaults were used.
    MalformedSettings { path: PathBuf, reason: String },
}

/// Partial metadata update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub pinned: Option<bool>,
    pub model: Option<String>,
}

impl MetadataPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn pinned(pinned: bool) -> Self {
        Self {
            pinned: Some(pinned),
            ..Self::default()
        }
    }
}

/// Self-describing export bundle (`.orion` files).
#[derive(Debug, Serialize, Deserialize)]
struct ChatBundle {
    magic: String,
    version: String,
    timestamp: i64,
    data: Conversation,
}

/// File-backed store of conversation records.
///
/// Not thread-safe by design: the UI thread owns the store and issues one
/// call at a time. Mutating operations take `&mut self` so the compiler
/// holds callers to that.
pub struct SessionStore {
    dir: PathBuf,
    codec: Box<dyn RecordCodec>,
    last_id: u64,
    on_diagnostic: Option<Box<dyn Fn(StoreDiagnostic)>>,
}

impl SessionStore {
    /// Open a store over `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            codec: Box::new(XorObfuscator),
            last_id: 0,
            on_diagnostic: None,
        })
    }

    /// Swap the record codec. Existing files written with a different
    /// codec will surface as `Format` errors (or be skipped by `list`).
    pub fn with_codec(mut self, codec: Box<dyn RecordCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Install a hook for tolerated-but-reported conditions.
    pub fn with_diagnostic_hook(mut self, hook: impl Fn(StoreDiagnostic) + 'static) -> Self {
        self.on_diagnostic = Some(Box::new(hook));
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new conversation, optionally seeded with one turn, and
    /// persist it immediately.
    pub fn create(&mut self, initial_turn: Option<Turn>) -> StoreResult<u64> {
        if let Some(turn) = &initial_turn {
            if turn.text.trim().is_empty() {
                return Err(StoreError::InvalidOperation(
                    "stored turns cannot be empty".to_string(),
                ));
            }
        }
        let id = self.next_id();
        let mut conversation = Conversation::new(id);
        conversation.turns.extend(initial_turn);
        self.write_record(&conversation)?;
        debug!(id, "created conversation");
        Ok(id)
    }

    pub fn load(&self, id: u64) -> StoreResult<Conversation> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(StoreError::NotFound(id));
        }
        self.read_record(&path)
    }

    /// Append one turn, preserving order, and stamp the record modified.
    pub fn append_turn(&mut self, id: u64, sender: Sender, text: &str) -> StoreResult<()> {
        if text.trim().is_empty() {
            return Err(StoreError::InvalidOperation(
                "stored turns cannot be empty".to_string(),
            ));
        }
        let mut conversation = self.load(id)?;
        conversation.turns.push(Turn::new(sender, text));
        conversation.touch();
        self.write_record(&conversation)
    }

    /// Apply a partial metadata update. Does not bump the last-modified
    /// stamp, so pinning or renaming never reorders the chat list.
    pub fn update_metadata(&mut self, id: u64, patch: MetadataPatch) -> StoreResult<()> {
        let mut conversation = self.load(id)?;
        if let Some(title) = patch.title {
            conversation.custom_title = Some(title);
        }
        if let Some(pinned) = patch.pinned {
            conversation.pinned = pinned;
        }
        if let Some(model) = patch.model {
            conversation.model = model;
        }
        self.write_record(&conversation)
    }

    /// Replace the text of a user-authored turn. Editing assistant or
    /// system turns is not permitted.
    pub fn edit_turn(&mut self, id: u64, index: usize, new_text: &str) -> StoreResult<()> {
        if new_text.trim().is_empty() {
            return Err(StoreError::InvalidOperation(
                "stored turns cannot be empty".to_string(),
            ));
        }
        let mut conversation = self.load(id)?;
        let len = conversation.turns.len();
        let turn = conversation.turns.get_mut(index).ok_or_else(|| {
            StoreError::InvalidOperation(format!("turn index {} out of bounds (length {})", index, len))
        })?;
        if turn.sender != Sender::User {
            return Err(StoreError::InvalidOperation(format!(
                "turn {} was sent by {} and cannot be edited",
                index,
                turn.sender.as_str()
            )));
        }
        turn.text = new_text.to_string();
        conversation.touch();
        self.write_record(&conversation)
    }

    /// Remove one turn; later turns shift down.
    pub fn delete_turn(&mut self, id: u64, index: usize) -> StoreResult<()> {
        let mut conversation = self.load(id)?;
        if index >= conversation.turns.len() {
            return Err(StoreError::OutOfBounds {
                index,
                len: conversation.turns.len(),
            });
        }
        conversation.turns.remove(index);
        conversation.touch();
        self.write_record(&conversation)
    }

    /// Remove the durable record entirely. Deleting an id twice reports
    /// `NotFound` the second time, which callers treat as already done.
    pub fn delete(&mut self, id: u64) -> StoreResult<()> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(StoreError::NotFound(id));
        }
        fs::remove_file(&path)?;
        debug!(id, "deleted conversation");
        Ok(())
    }

    /// Enumerate every readable conversation, sorted pinned-first and
    /// most-recently-modified within each group. Files that fail to
    /// decode are skipped and reported through the diagnostic hook, never
    /// as an error for the whole listing.
    pub fn list(&self, filter: Option<&str>) -> StoreResult<Vec<ConversationSummary>> {
        let needle = filter.map(|f| f.to_lowercase());
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if parse_record_name(&entry.file_name()).is_none() {
                continue;
            }
            let path = entry.path();
            let conversation = match self.read_record(&path) {
                Ok(c) => c,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable conversation record");
                    self.emit(StoreDiagnostic::CorruptRecordSkipped {
                        path,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            let summary = conversation.summary();
            if let Some(needle) = &needle {
                if !summary.title.to_lowercase().contains(needle) {
                    continue;
                }
            }
            summaries.push(summary);
        }
        summaries.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then(b.updated_at.cmp(&a.updated_at))
        });
        Ok(summaries)
    }

    /// Number of conversation records on disk, unreadable ones included.
    pub fn count(&self) -> StoreResult<usize> {
        let mut n = 0;
        for entry in fs::read_dir(&self.dir)? {
            if parse_record_name(&entry?.file_name()).is_some() {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Delete every conversation record, returning how many were removed.
    pub fn clear_all(&mut self) -> StoreResult<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if parse_record_name(&entry.file_name()).is_some() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Serialize one conversation into a self-describing bundle.
    pub fn export(&self, id: u64) -> StoreResult<Vec<u8>> {
        let conversation = self.load(id)?;
        let bundle = ChatBundle {
            magic: BUNDLE_MAGIC.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().timestamp(),
            data: conversation,
        };
        serde_json::to_vec_pretty(&bundle).map_err(|e| StoreError::Format(e.to_string()))
    }

    /// Import a bundle produced by [`SessionStore::export`] (possibly on
    /// another machine). The conversation always gets a fresh id; the
    /// exported id is never reused.
    pub fn import(&mut self, bundle: &[u8]) -> StoreResult<u64> {
        let bundle: ChatBundle =
            serde_json::from_slice(bundle).map_err(|e| StoreError::Format(e.to_string()))?;
        if bundle.magic != BUNDLE_MAGIC {
            return Err(StoreError::Format(format!(
                "not an Orion chat bundle (missing {} marker)",
                BUNDLE_MAGIC
            )));
        }
        let id = self.next_id();
        let mut conversation = bundle.data;
        conversation.id = id;
        self.write_record(&conversation)?;
        debug!(id, version = %bundle.version, "imported conversation");
        Ok(id)
    }

    /// Write an export bundle to `path` (conventionally `.orion`).
    pub fn export_to_file(&self, id: u64, path: &Path) -> StoreResult<()> {
        let bundle = self.export(id)?;
        fs::write(path, bundle)?;
        Ok(())
    }

    /// Import a bundle file, returning the new conversation id.
    pub fn import_from_file(&mut self, path: &Path) -> StoreResult<u64> {
        let bytes = fs::read(path)?;
        self.import(&bytes)
    }

    /// Time-based id, bumped past both the previous allocation and any
    /// record already on disk so rapid creation within one clock second
    /// cannot silently overwrite an existing conversation.
    fn next_id(&mut self) -> u64 {
        let mut id = (Utc::now().timestamp().max(0) as u64).max(self.last_id + 1);
        while self.record_path(id).exists() {
            id += 1;
        }
        self.last_id = id;
        id
    }

    fn record_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("chat_{}.dat", id))
    }

    fn read_record(&self, path: &Path) -> StoreResult<Conversation> {
        let raw = fs::read(path)?;
        let plain = if raw.starts_with(RECORD_MAGIC) {
            self.codec.decode(&raw[RECORD_MAGIC.len()..])
        } else {
            // legacy record from before the obfuscation layer
            raw
        };
        serde_json::from_slice(&plain).map_err(|e| StoreError::Format(e.to_string()))
    }

    fn write_record(&self, conversation: &Conversation) -> StoreResult<()> {
        let plain =
            serde_json::to_vec(conversation).map_err(|e| StoreError::Format(e.to_string()))?;
        let mut bytes = Vec::with_capacity(RECORD_MAGIC.len() + plain.len());
        bytes.extend_from_slice(RECORD_MAGIC);
        bytes.extend_from_slice(&self.codec.encode(&plain));
        fs::write(self.record_path(conversation.id), bytes)?;
        Ok(())
    }

    fn emit(&self, diagnostic: StoreDiagnostic) {
        if let Some(hook) = &self.on_diagnostic {
            hook(diagnostic);
        }
    }
}

fn parse_record_name(name: &OsStr) -> Option<u64> {
    name.to_str()?
        .strip_prefix("chat_")?
        .strip_suffix(".dat")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store(dir: &Path) -> SessionStore {
        SessionStore::open(dir).unwrap()
    }

    #[test]
    fn test_append_preserves_order() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let id = store.create(None).unwrap();

        store.append_turn(id, Sender::User, "first").unwrap();
        store.append_turn(id, Sender::Assistant, "second").unwrap();
        store.append_turn(id, Sender::System, "third").unwrap();
        store.append_turn(id, Sender::User, "fourth").unwrap();

        let conversation = store.load(id).unwrap();
        let texts: Vec<&str> = conversation.turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third", "fourth"]);
        assert_eq!(conversation.turns[2].sender, Sender::System);
    }

    #[test]
    fn test_empty_turn_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let id = store.create(None).unwrap();
        let err = store.append_turn(id, Sender::User, "   ").unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation(_)));
    }

    #[test]
    fn test_create_ids_unique_within_one_second() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let a = store.create(None).unwrap();
        let b = store.create(None).unwrap();
        let c = store.create(None).unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        assert!(matches!(store.load(42), Err(StoreError::NotFound(42))));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let id = store.create(None).unwrap();
        store.delete(id).unwrap();
        assert!(matches!(store.delete(id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_edit_turn_user_only() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let id = store.create(None).unwrap();
        store.append_turn(id, Sender::Assistant, "hello").unwrap();
        store.append_turn(id, Sender::User, "hi there").unwrap();
        store.append_turn(id, Sender::System, "note").unwrap();

        assert!(matches!(
            store.edit_turn(id, 0, "rewritten"),
            Err(StoreError::InvalidOperation(_))
        ));
        assert!(matches!(
            store.edit_turn(id, 2, "rewritten"),
            Err(StoreError::InvalidOperation(_))
        ));
        assert!(matches!(
            store.edit_turn(id, 9, "rewritten"),
            Err(StoreError::InvalidOperation(_))
        ));

        store.edit_turn(id, 1, "hi, edited").unwrap();
        let conversation = store.load(id).unwrap();
        assert_eq!(conversation.turns[1].text, "hi, edited");
        assert_eq!(conversation.turns[0].text, "hello");
    }

    #[test]
    fn test_delete_turn_shifts_indices() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let id = store.create(None).unwrap();
        store.append_turn(id, Sender::User, "a").unwrap();
        store.append_turn(id, Sender::Assistant, "b").unwrap();
        store.append_turn(id, Sender::User, "c").unwrap();

        store.delete_turn(id, 1).unwrap();
        let conversation = store.load(id).unwrap();
        let texts: Vec<&str> = conversation.turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["a", "c"]);

        assert!(matches!(
            store.delete_turn(id, 5),
            Err(StoreError::OutOfBounds { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_metadata_patch_is_partial() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let id = store.create(Some(Turn::user("initial question"))).unwrap();

        store.update_metadata(id, MetadataPatch::pinned(true)).unwrap();
        let c = store.load(id).unwrap();
        assert!(c.pinned);
        assert!(c.custom_title.is_none());

        store
            .update_metadata(id, MetadataPatch::title("Renamed"))
            .unwrap();
        let c = store.load(id).unwrap();
        assert!(c.pinned);
        assert_eq!(c.custom_title.as_deref(), Some("Renamed"));
        assert_eq!(c.display_title(), "Renamed");
    }

    #[test]
    fn test_list_sorts_pinned_then_recency() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        // A pinned at T1, B unpinned at T3, C pinned at T2, T3 > T2 > T1.
        let a = store.create(Some(Turn::user("conversation a"))).unwrap();
        let b = store.create(Some(Turn::user("conversation b"))).unwrap();
        let c = store.create(Some(Turn::user("conversation c"))).unwrap();

        let stamp = |store: &SessionStore, id: u64, pinned: bool, ts: i64| {
            let mut conv = store.load(id).unwrap();
            conv.pinned = pinned;
            conv.updated_at = ts;
            store.write_record(&conv).unwrap();
        };
        stamp(&store, a, true, 1_000);
        stamp(&store, b, false, 3_000);
        stamp(&store, c, true, 2_000);

        let order: Vec<u64> = store.list(None).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(order, vec![c, a, b]);
    }

    #[test]
    fn test_list_filters_titles_case_insensitively() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        store
            .create(Some(Turn::user("Buy groceries tomorrow and also pick up the dry cleaning")))
            .unwrap();
        store.create(Some(Turn::user("Plan trip"))).unwrap();

        let hits = store.list(Some("groc")).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].title.starts_with("Buy groceries"));
        assert!(hits[0].title.ends_with("..."));

        assert_eq!(store.list(Some("GROC")).unwrap().len(), 1);
        assert_eq!(store.list(Some("zzz")).unwrap().len(), 0);
    }

    #[test]
    fn test_list_skips_corrupt_records_and_reports_them() {
        let tmp = tempfile::tempdir().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut store = SessionStore::open(tmp.path())
            .unwrap()
            .with_diagnostic_hook(move |d| sink.borrow_mut().push(d));

        let good = store.create(Some(Turn::user("survivor"))).unwrap();
        fs::write(tmp.path().join("chat_99999.dat"), b"ORION_ENCgarbage").unwrap();

        let listed = store.list(None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, good);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            StoreDiagnostic::CorruptRecordSkipped { path, .. } => {
                assert!(path.ends_with("chat_99999.dat"));
            }
            other => panic!("unexpected diagnostic: {:?}", other),
        }
    }

    #[test]
    fn test_legacy_plain_record_still_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let id = store.create(Some(Turn::user("hello"))).unwrap();

        // Rewrite the record as a pre-obfuscation plain JSON file.
        let conversation = store.load(id).unwrap();
        let plain = serde_json::to_vec(&conversation).unwrap();
        fs::write(tmp.path().join(format!("chat_{}.dat", id)), plain).unwrap();

        let reloaded = store.load(id).unwrap();
        assert_eq!(reloaded.turns[0].text, "hello");
    }

    #[test]
    fn test_record_bytes_are_tagged_and_obfuscated() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let id = store
            .create(Some(Turn::user("very secret grocery list")))
            .unwrap();

        let raw = fs::read(tmp.path().join(format!("chat_{}.dat", id))).unwrap();
        assert!(raw.starts_with(RECORD_MAGIC));
        let body = String::from_utf8_lossy(&raw);
        assert!(!body.contains("grocery"));
    }

    #[test]
    fn test_export_import_round_trip_assigns_new_id() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let id = store.create(Some(Turn::user("take me along"))).unwrap();
        store.append_turn(id, Sender::Assistant, "sure").unwrap();
        store
            .update_metadata(id, MetadataPatch::title("Travels"))
            .unwrap();

        let bundle = store.export(id).unwrap();
        let new_id = store.import(&bundle).unwrap();

        assert_ne!(id, new_id);
        let original = store.load(id).unwrap();
        let imported = store.load(new_id).unwrap();
        assert_eq!(imported.turns, original.turns);
        assert_eq!(imported.custom_title, original.custom_title);
        assert_eq!(imported.id, new_id);
    }

    #[test]
    fn test_import_rejects_missing_magic() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());

        // Valid JSON, wrong marker.
        let forged = br#"{"magic":"SOMETHING_ELSE","version":"0","timestamp":0,"data":{"id":1,"turns":[],"updated_at":0}}"#;
        assert!(matches!(store.import(forged), Err(StoreError::Format(_))));

        // Not a bundle at all.
        assert!(matches!(
            store.import(b"not json"),
            Err(StoreError::Format(_))
        ));
    }

    #[test]
    fn test_export_import_via_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        let id = store.create(Some(Turn::user("file trip"))).unwrap();

        let bundle_path = tmp.path().join(format!("shared.{}", BUNDLE_EXTENSION));
        store.export_to_file(id, &bundle_path).unwrap();
        let new_id = store.import_from_file(&bundle_path).unwrap();
        assert_ne!(id, new_id);
        assert_eq!(store.load(new_id).unwrap().turns[0].text, "file trip");
    }

    #[test]
    fn test_count_and_clear_all() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path());
        store.create(None).unwrap();
        store.create(None).unwrap();
        store.create(None).unwrap();
        assert_eq!(store.count().unwrap(), 3);

        assert_eq!(store.clear_all().unwrap(), 3);
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.list(None).unwrap().is_empty());
    }
}
