use crate::errors::GuidepostError;
use std::fs;
use std::path::{Path, PathBuf};

/// Whether `candidate` belongs to the same log family as `active`: same
/// directory, same extension, and a name of the form `<stem>-*` or
/// `<stem>.*`. Files outside the family are never counted or deleted.
pub fn is_log_sibling(active: &Path, candidate: &Path) -> bool {
    if candidate == active || candidate.parent() != active.parent() {
        return false;
    }
    let (Some(stem), Some(name)) = (
        active.file_stem().and_then(|s| s.to_str()),
        candidate.file_name().and_then(|s| s.to_str()),
    ) else {
        return false;
    };
    if active.extension() != candidate.extension() {
        return false;
    }
    name.starts_with(&format!("{stem}-")) || name.starts_with(&format!("{stem}."))
}

/// Deletes the oldest sibling logs of `active` until the family fits in
/// `budget_bytes`. The active log itself is never deleted.
pub fn enforce_total_budget(
    active: &Path,
    budget_bytes: u64,
) -> Result<Vec<PathBuf>, GuidepostError> {
    let Some(dir) = active.parent() else {
        return Ok(Vec::new());
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let active_in_dir = dir.join(active.file_name().unwrap_or_default());

    let mut siblings = fs::read_dir(dir)
        .map_err(|e| GuidepostError::Io(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_log_sibling(&active_in_dir, path))
        .collect::<Vec<_>>();

    siblings.sort_by(|a, b| {
        let ma = fs::metadata(a).ok().and_then(|m| m.modified().ok());
        let mb = fs::metadata(b).ok().and_then(|m| m.modified().ok());
        ma.cmp(&mb)
    });

    let active_len = fs::metadata(&active_in_dir).map(|m| m.len()).unwrap_or(0);
    let mut total = active_len
        + siblings
            .iter()
            .filter_map(|path| fs::metadata(path).ok().map(|meta| meta.len()))
            .sum::<u64>();

    let mut deleted = Vec::new();
    for path in siblings {
        if total <= budget_bytes {
            break;
        }
        let len = fs::metadata(&path)
            .map_err(|e| GuidepostError::Io(e.to_string()))?
            .len();
        fs::remove_file(&path).map_err(|e| GuidepostError::Io(e.to_string()))?;
        total = total.saturating_sub(len);
        deleted.push(path);
    }

    Ok(deleted)
}
