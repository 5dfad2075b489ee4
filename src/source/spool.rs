//! A remote source backed by a spool directory of JSON items.
//!
//! Each `<item-id>.json` file holds one [`RemoteMessage`]. File attachments
//! carry their bytes inline (base64) or point to a file relative to the
//! spool directory.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{FerryError, Result};
use crate::model::attachment::Attachment;
use crate::model::remote::RemoteMessage;

use super::{ListQuery, RemoteSource};

const ITEM_EXTENSION: &str = "json";

pub struct SpoolSource {
    dir: PathBuf,
}

impl SpoolSource {
    /// Open an existing spool directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(FerryError::spool(&dir, "not a directory"));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn item_path(&self, item_id: &str) -> PathBuf {
        self.dir.join(format!("{item_id}.{ITEM_EXTENSION}"))
    }

    fn item_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| FerryError::io(&self.dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| FerryError::io(&self.dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == ITEM_EXTENSION) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

/// Read one spool item. The item id is the file stem; relative attachment
/// paths are resolved against the item's directory.
pub fn load_item(path: &Path) -> Result<RemoteMessage> {
    let data = std::fs::read(path).map_err(|e| FerryError::io(path, e))?;
    let mut msg: RemoteMessage =
        serde_json::from_slice(&data).map_err(|e| FerryError::spool(path, e))?;

    if let Some(stem) = path.file_stem() {
        msg.item_id = stem.to_string_lossy().into_owned();
    }
    let base = path.parent().unwrap_or(Path::new("."));
    for attachment in &mut msg.attachments {
        if let Attachment::File(file) = attachment {
            file.payload.resolve_against(base);
        }
    }
    Ok(msg)
}

/// Newest first; items without a timestamp last, ties broken by item id.
fn sort_newest_first(items: &mut [RemoteMessage]) {
    items.sort_by(|a, b| {
        (a.received.is_none(), Reverse(a.received), &a.item_id).cmp(&(
            b.received.is_none(),
            Reverse(b.received),
            &b.item_id,
        ))
    });
}

impl RemoteSource for SpoolSource {
    fn list_messages(&mut self, query: &ListQuery) -> Result<Vec<RemoteMessage>> {
        let mut items = Vec::new();
        for path in self.item_paths()? {
            items.push(load_item(&path)?);
        }
        sort_newest_first(&mut items);

        if query.unread_only {
            items.retain(|item| !item.is_read);
        }
        if let Some(limit) = query.limit {
            items.truncate(limit);
        }

        info!(
            spool = %self.dir.display(),
            count = items.len(),
            unread_only = query.unread_only,
            "Listed remote items"
        );
        Ok(items)
    }

    fn mark_read(&mut self, item: &RemoteMessage) -> Result<()> {
        let path = self.item_path(&item.item_id);
        let data = std::fs::read(&path).map_err(|e| FerryError::io(&path, e))?;

        // Work on the stored JSON rather than the in-memory item so resolved
        // attachment paths are not written back.
        let mut value: serde_json::Value =
            serde_json::from_slice(&data).map_err(|e| FerryError::spool(&path, e))?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| FerryError::spool(&path, "item is not a JSON object"))?;
        object.insert("is_read".to_string(), serde_json::Value::Bool(true));

        let out = serde_json::to_vec_pretty(&value).map_err(|e| FerryError::spool(&path, e))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, out).map_err(|e| FerryError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| FerryError::io(&path, e))?;

        debug!(item = %item.item_id, "Marked item read");
        Ok(())
    }
}
