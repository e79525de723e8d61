use std::path::Path;

use anyhow::{Context, Result};
use shared::protocol::Session;
use tokio::fs;
use tracing::{debug, warn};

/// Session left behind by an earlier invocation. Unreadable files are
/// treated as signed out.
pub async fn load(path: &Path) -> Option<Session> {
    let raw = fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "session file is corrupt; ignoring");
            None
        }
    }
}

pub async fn save(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(session)?;
    fs::write(path, raw)
        .await
        .with_context(|| format!("failed to write session file '{}'", path.display()))?;
    debug!(path = %path.display(), "session persisted");
    Ok(())
}

pub async fn clear(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err)
            .with_context(|| format!("failed to remove session file '{}'", path.display())),
    }
}
