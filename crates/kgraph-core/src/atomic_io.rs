use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Returns a hidden, process-unique temporary path next to `path`.
///
/// The temp file lives in the same directory as the destination so the final
/// rename never crosses a filesystem boundary.
pub fn temporary_sibling_path(path: &Path) -> PathBuf {
    let parent_dir = parent_or_current(path);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("graph");
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    parent_dir.join(format!(
        ".{file_name}.tmp-{}-{nanos}-{sequence}",
        std::process::id()
    ))
}

/// Writes text using a temp file + rename so readers never observe partial data.
///
/// The temp file is flushed and synced before the rename. On any failure the
/// temp file is removed and the destination keeps its previous content.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = parent_or_current(path);
    fs::create_dir_all(&parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let temp_path = temporary_sibling_path(path);
    if let Err(error) = write_and_sync(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(error);
    }
    if let Err(error) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(error).with_context(|| {
            format!(
                "failed to rename temporary file {} to {}",
                temp_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}

fn write_and_sync(temp_path: &Path, content: &str) -> Result<()> {
    let mut file = File::create(temp_path)
        .with_context(|| format!("failed to create temporary file {}", temp_path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync temporary file {}", temp_path.display()))?;
    Ok(())
}

fn parent_or_current(path: &Path) -> PathBuf {
    path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn unit_write_text_atomic_writes_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("sample.jsonl");
        write_text_atomic(&path, "hello world").expect("write");
        assert_eq!(read_to_string(&path).expect("read"), "hello world");
    }

    #[test]
    fn functional_write_text_atomic_replaces_existing_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("graph.jsonl");
        write_text_atomic(&path, "first version\nwith two lines\n").expect("first write");
        write_text_atomic(&path, "second").expect("second write");
        assert_eq!(read_to_string(&path).expect("read"), "second");
    }

    #[test]
    fn functional_write_text_atomic_creates_missing_parent_directories() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("nested").join("deeper").join("graph.jsonl");
        write_text_atomic(&path, "{}").expect("write");
        assert_eq!(read_to_string(&path).expect("read"), "{}");
    }

    #[test]
    fn regression_write_text_atomic_leaves_no_temporary_files() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("graph.jsonl");
        for round in 0..3 {
            write_text_atomic(&path, &format!("round {round}")).expect("write");
        }
        let names = fs::read_dir(tempdir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect::<Vec<_>>();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0], "graph.jsonl");
    }

    #[test]
    fn regression_write_text_atomic_rejects_directory_destination() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let error = write_text_atomic(tempdir.path(), "content").expect_err("directory");
        assert!(error.to_string().contains("is a directory"));
    }

    #[test]
    fn unit_temporary_sibling_path_is_unique_and_adjacent() {
        let path = Path::new("/var/data/memory.jsonl");
        let first = temporary_sibling_path(path);
        let second = temporary_sibling_path(path);
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(Path::new("/var/data")));
        let name = first.file_name().and_then(|name| name.to_str()).expect("name");
        assert!(name.starts_with(".memory.jsonl.tmp-"));
    }
}
