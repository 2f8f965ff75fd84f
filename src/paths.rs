//! Lexical path helpers used to tag every diagnostic block with a path
//! relative to the directory refmt was invoked from.

use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against `base` and fold away `.` and `..` components.
///
/// This is purely lexical: symlinks are not resolved and the filesystem is
/// never touched, so it works for paths that don't exist.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            // Popping past the root leaves the root in place
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Compute `target` relative to the directory `base`.
///
/// Both paths should be absolute and already folded with [`absolutize`].
/// Identical paths give an empty path. When the two share no component at
/// all (different drive prefixes on Windows) the target is returned as-is.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();

    let common = base.iter().zip(&target).take_while(|(a, b)| a == b).count();
    if common == 0 {
        return target.iter().collect();
    }

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

/// The path shown in diagnostics for a caller-supplied argument.
pub fn display_path(cwd: &Path, path: &Path) -> String {
    let absolute = absolutize(cwd, path);
    relative_path(&absolutize(cwd, Path::new("")), &absolute)
        .to_string_lossy()
        .into_owned()
}
