//! Lexical path helpers shared by the expander and the walker.
//!
//! Nothing here touches the filesystem: archive entries are checked before
//! the files they name exist.

use std::path::{Component, Path, PathBuf};

/// Convert a path to a display string with forward slash separators.
pub fn path_to_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Normalize a path by resolving `.` and `..` components without filesystem access.
///
/// Leading `..` on a relative path is kept; `..` directly under the root is dropped.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => components.push(Component::Prefix(p)),
            Component::RootDir => {
                components.retain(|c| matches!(c, Component::Prefix(_)));
                components.push(Component::RootDir);
            }
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::ParentDir | Component::CurDir) | None => {
                    components.push(Component::ParentDir);
                }
            },
            Component::Normal(c) => components.push(Component::Normal(c)),
        }
    }

    if components.is_empty() {
        PathBuf::from(".")
    } else {
        components.iter().collect()
    }
}

/// Resolve an archive entry name against `root`.
///
/// Returns `Err(resolved)` when the entry is absolute or would land outside
/// `root` once `..` components are applied. Backslashes count as separators
/// so archives built on Windows are checked the same way everywhere.
/// `root` may be relative, including `.`; the result is then relative too.
pub fn resolve_within(root: &Path, entry_name: &str) -> Result<PathBuf, PathBuf> {
    let unified = entry_name.replace('\\', "/");
    let entry = Path::new(&unified);
    let root = match normalize_path(root) {
        cwd if cwd == Path::new(".") => PathBuf::new(),
        root => root,
    };

    let has_drive = unified
        .split('/')
        .next()
        .is_some_and(|first| first.len() == 2 && first.ends_with(':'));
    if entry.has_root() || has_drive {
        return Err(normalize_path(entry));
    }

    let resolved = normalize_path(&root.join(entry));
    let climbs_out = leading_parents(&resolved) > leading_parents(&root);
    if resolved.starts_with(&root) && !climbs_out {
        Ok(resolved)
    } else {
        Err(resolved)
    }
}

fn leading_parents(path: &Path) -> usize {
    path.components()
        .take_while(|c| matches!(c, Component::ParentDir))
        .count()
}
