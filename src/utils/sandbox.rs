use crate::errors::ToolError;
use crate::utils::paths::normalize_lexically;
use std::path::{Path, PathBuf};

fn ensure_inside_root(root: &Path, candidate: &Path, label: &str) -> Result<(), ToolError> {
    if candidate != root && candidate.starts_with(root) {
        return Ok(());
    }
    Err(
        ToolError::denied(format!("{} must resolve under {}", label, root.display()))
            .with_code("PATH_ESCAPE")
            .with_hint("Use a file name relative to the log directory, without '..'."),
    )
}

/// Resolves `candidate` (relative to `root`, or absolute) and refuses
/// anything that lands outside `root`.
///
/// The lexical check runs first so traversal is rejected without touching
/// the filesystem; when the target exists it is canonicalized and checked
/// again so a symlink cannot lead out of the root.
pub fn resolve_inside_root(root: &Path, candidate: &str, label: &str) -> Result<PathBuf, ToolError> {
    let root_lexical = normalize_lexically(root);
    let joined = if Path::new(candidate).is_absolute() {
        PathBuf::from(candidate)
    } else {
        root_lexical.join(candidate)
    };
    let lexical = normalize_lexically(&joined);
    ensure_inside_root(&root_lexical, &lexical, label)?;

    match (std::fs::canonicalize(root), std::fs::canonicalize(&lexical)) {
        (Ok(root_real), Ok(real)) => {
            ensure_inside_root(&root_real, &real, label)?;
            Ok(real)
        }
        _ => Ok(lexical),
    }
}

/// `path` relative to `root`, trying the canonical root when the lexical one
/// does not prefix it.
pub fn relative_to_root(root: &Path, path: &Path) -> PathBuf {
    let lexical = normalize_lexically(root);
    if let Ok(rest) = path.strip_prefix(&lexical) {
        return rest.to_path_buf();
    }
    std::fs::canonicalize(root)
        .ok()
        .and_then(|real| path.strip_prefix(real).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!("sandbox-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(root.join("nested")).unwrap();
        root
    }

    #[test]
    fn traversal_is_rejected_lexically() {
        let root = PathBuf::from("/var/log");
        let err = resolve_inside_root(&root, "../../etc/passwd", "filename").unwrap_err();
        assert_eq!(err.code, "PATH_ESCAPE");
        let err = resolve_inside_root(&root, "/etc/passwd", "filename").unwrap_err();
        assert_eq!(err.code, "PATH_ESCAPE");
        assert!(resolve_inside_root(&root, ".", "filename").is_err());
    }

    #[test]
    fn absolute_paths_under_root_are_accepted() {
        let root = temp_root();
        std::fs::write(root.join("nested/app.log"), "x\n").unwrap();
        let absolute = root.join("nested/app.log");
        let resolved = resolve_inside_root(&root, absolute.to_str().unwrap(), "filename").unwrap();
        assert_eq!(relative_to_root(&root, &resolved), PathBuf::from("nested/app.log"));
        std::fs::remove_dir_all(&root).ok();
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_root_is_rejected() {
        let root = temp_root();
        let outside = std::env::temp_dir().join(format!("outside-{}.log", uuid::Uuid::new_v4()));
        std::fs::write(&outside, "secret\n").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link.log")).unwrap();
        let err = resolve_inside_root(&root, "link.log", "filename").unwrap_err();
        assert_eq!(err.code, "PATH_ESCAPE");
        std::fs::remove_dir_all(&root).ok();
        std::fs::remove_file(&outside).ok();
    }
}
