//! Durable storage for Orion conversations and user preferences.
//!
//! Two stores, one data directory:
//! - [`SessionStore`]: one obfuscated record per conversation
//!   (`chat_<id>.dat`), with create/append/edit/delete, listing and
//!   export/import bundles.
//! - [`PreferenceStore`]: the single `orion_settings.json` record with
//!   defaulting and range clamping on load.
//!
//! Both are pure storage: they never call the model, the model hub, or the
//! network. A single UI-owning thread is expected to issue all calls;
//! mutating operations take `&mut self` so at most one is in flight per
//! store instance.

pub mod codec;
pub mod error;
pub mod maintenance;
pub mod prefs;
pub mod sessions;

pub use codec::{RecordCodec, XorObfuscator, RECORD_MAGIC};
pub use error::{StoreError, StoreResult};
pub use prefs::PreferenceStore;
pub use sessions::{MetadataPatch, SessionStore, StoreDiagnostic, BUNDLE_EXTENSION, BUNDLE_MAGIC};

/// Per-user data directory for conversation records and settings.
pub fn default_data_dir() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("com.omninode", "OmniNode", "Orion")
        .map(|p| p.data_dir().to_path_buf())
}
