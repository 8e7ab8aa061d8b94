use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// True when a directory named `name` should be skipped by copy and size walks
pub fn is_excluded_dir(name: &OsStr, excluded: &[&str]) -> bool {
    excluded.iter().any(|ex| name == OsStr::new(ex))
}

/// True for dot-directories such as `.git` or `.cache`
pub fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Find regular files recursively, skipping directories for which `skip_dir` returns true.
///
/// Paths are returned relative to `root`, sorted lexicographically so that the
/// result does not depend on directory enumeration order.
pub fn collect_files<F>(root: &Path, skip_dir: &F) -> io::Result<Vec<PathBuf>>
where
    F: Fn(&OsStr) -> bool + ?Sized,
{
    let mut result = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(relative) = pending.pop() {
        for entry in fs::read_dir(root.join(&relative))? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let name = entry.file_name();

            if file_type.is_dir() {
                if !skip_dir(&name) {
                    pending.push(relative.join(&name));
                }
            } else if file_type.is_file() {
                result.push(relative.join(&name));
            }
        }
    }

    result.sort();
    Ok(result)
}

/// Copy a directory tree, skipping any directory whose name is in `excluded`
pub fn copy_dir<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dest: Q, excluded: &[&str]) -> io::Result<()> {
    let mut pending = vec![(src.as_ref().to_path_buf(), dest.as_ref().to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to)?;
        for entry in fs::read_dir(&from)? {
            let entry = entry?;
            let name = entry.file_name();
            let target = to.join(&name);

            if entry.file_type()?.is_dir() {
                if !is_excluded_dir(&name, excluded) {
                    pending.push((entry.path(), target));
                }
            } else {
                // Follows symlinks, the installed copy holds real files
                fs::copy(entry.path(), &target)?;
            }
        }
    }

    Ok(())
}

/// Total size in bytes of all files under `path`, skipping `excluded` directories.
///
/// Unreadable entries count as zero.
pub fn dir_size<P: AsRef<Path>>(path: P, excluded: &[&str]) -> u64 {
    let mut total = 0;
    let mut pending = vec![path.as_ref().to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else { continue };
            if file_type.is_dir() {
                if !is_excluded_dir(&entry.file_name(), excluded) {
                    pending.push(entry.path());
                }
            } else if let Ok(metadata) = fs::metadata(entry.path()) {
                total += metadata.len();
            }
        }
    }

    total
}

/// Remove a directory tree, treating an already-absent directory as success
pub fn remove_dir_all_if_exists<P: AsRef<Path>>(path: P) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
