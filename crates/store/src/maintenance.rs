//! Housekeeping around the data directory: the pre-update backup archive
//! and the plain-text "export everything" dump from the settings dialog.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use shared::chat::Sender;
use tracing::debug;

use crate::sessions::SessionStore;

/// Archive the entire data directory to
/// `orion_backup_<YYYYmmdd_HHMMSS>.tar.gz` under `dest_dir`. `dest_dir`
/// must not live inside the data directory.
pub fn backup_data_dir(data_dir: &Path, dest_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating backup directory {}", dest_dir.display()))?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let archive_path = dest_dir.join(format!("orion_backup_{}.tar.gz", stamp));

    let file = fs::File::create(&archive_path)
        .with_context(|| format!("creating {}", archive_path.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    archive
        .append_dir_all("orion", data_dir)
        .context("archiving data directory")?;
    archive
        .into_inner()
        .context("finishing archive")?
        .finish()
        .context("flushing gzip stream")?;

    debug!(path = %archive_path.display(), "backup written");
    Ok(archive_path)
}

/// Dump every readable conversation as plain text to `dest`, in the
/// `You:` / `Orion:` transcript format. Unreadable records are skipped,
/// matching `list`. Returns how many conversations were written.
pub fn export_transcripts(store: &SessionStore, dest: &Path) -> Result<usize> {
    let mut out = fs::File::create(dest)
        .with_context(|| format!("creating {}", dest.display()))?;

    writeln!(out, "Orion Chat History Export")?;
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out)?;

    let mut written = 0;
    for summary in store.list(None)? {
        let conversation = match store.load(summary.id) {
            Ok(c) => c,
            Err(_) => continue,
        };
        writeln!(out, "Chat ID: {}", conversation.id)?;
        writeln!(out, "Title: {}", conversation.display_title())?;
        if !conversation.model.is_empty() {
            writeln!(out, "Model: {}", conversation.model)?;
        }
        let when = Utc
            .timestamp_opt(conversation.updated_at, 0)
            .single()
            .map(|t| t.to_rfc2822())
            .unwrap_or_else(|| conversation.updated_at.to_string());
        writeln!(out, "Last modified: {}", when)?;
        writeln!(out, "{}", "-".repeat(30))?;
        for turn in &conversation.turns {
            match turn.sender {
                Sender::User => writeln!(out, "You: {}", turn.text)?,
                Sender::Assistant => writeln!(out, "Orion: {}", turn.text)?,
                Sender::System => writeln!(out, "{}", turn.text)?,
            }
        }
        writeln!(out)?;
        written += 1;
    }
    Ok(written)
}
