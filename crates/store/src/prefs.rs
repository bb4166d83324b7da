//! Preference persistence.
//!
//! One pretty-printed JSON file (`orion_settings.json`), overwritten in
//! place. `load` never fails the caller: a missing file means defaults, a
//! malformed file means defaults plus a diagnostic. Saves go through a
//! temp file and rename so a crash mid-write cannot leave a truncated
//! file that parses as valid.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use shared::prefs::Preferences;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::sessions::StoreDiagnostic;

pub const SETTINGS_FILE: &str = "orion_settings.json";

/// File-backed store of the single [`Preferences`] record.
pub struct PreferenceStore {
    path: PathBuf,
    on_diagnostic: Option<Box<dyn Fn(StoreDiagnostic)>>,
}

impl PreferenceStore {
    /// Open a store over the settings file inside `dir`, creating the
    /// directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(SETTINGS_FILE),
            on_diagnostic: None,
        })
    }

    /// Install a hook for tolerated-but-reported conditions.
    pub fn with_diagnostic_hook(mut self, hook: impl Fn(StoreDiagnostic) + 'static) -> Self {
        self.on_diagnostic = Some(Box::new(hook));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, or the documented defaults if the file is missing
    /// or unreadable. Bounded numeric fields are clamped here, never on
    /// save.
    pub fn load(&self) -> Preferences {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Preferences::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "could not read settings, using defaults");
                return Preferences::default();
            }
        };
        match serde_json::from_slice::<Preferences>(&bytes) {
            Ok(prefs) => prefs.clamped(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "malformed settings file, using defaults");
                self.emit(StoreDiagnostic::MalformedSettings {
                    path: self.path.clone(),
                    reason: err.to_string(),
                });
                Preferences::default()
            }
        }
    }

    /// Overwrite the record with the full field set, atomically with
    /// respect to a single writer.
    pub fn save(&self, prefs: &Preferences) -> StoreResult<()> {
        let json =
            serde_json::to_vec_pretty(prefs).map_err(|e| StoreError::Format(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn emit(&self, diagnostic: StoreDiagnostic) {
        if let Some(hook) = &self.on_diagnostic {
            hook(diagnostic);
        }
    }
}
