use crate::error::{ComposerError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Reads the contents of a UTF-8 text file at the given path
///
/// # Errors
///
/// - `ComposerError::FileNotFound` if the path doesn't exist or isn't a file.
/// - `ComposerError::InvalidUtf8` if the file isn't valid UTF-8.
/// - `ComposerError::Io` if there's an error reading the file.
pub fn read_file_contents(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(ComposerError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    fs::read_to_string(path).map_err(|err| {
        if err.kind() == io::ErrorKind::InvalidData {
            ComposerError::InvalidUtf8 {
                path: path.to_path_buf(),
            }
        } else {
            ComposerError::Io(err)
        }
    })
}

/// Writes `contents` to `path` through a temporary file in the same directory,
/// so readers only ever see the old file or the complete new one.
///
/// # Errors
///
/// Returns `ComposerError::Io` if the directory can't be created or the write/rename fails.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(contents.as_bytes())?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path)?;

    Ok(())
}

/// Joins a relative output path onto `base`, refusing anything that could escape it
///
/// # Errors
///
/// Returns `ComposerError::PathTraversal` if `relative` is absolute or contains
/// `..`, root or prefix components.
pub fn safe_join(base: &Path, relative: &Path) -> Result<PathBuf> {
    let escapes = relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ComposerError::PathTraversal {
            path: relative.to_path_buf(),
        });
    }

    Ok(base.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_file_contents() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");

        // Test reading existing file
        fs::write(&file_path, "test content").unwrap();
        let result = read_file_contents(&file_path);
        assert_eq!(result.unwrap(), "test content");

        // Test reading non-existent file
        let non_existent = temp_dir.path().join("nonexistent.txt");
        let result = read_file_contents(&non_existent);
        assert!(matches!(result, Err(ComposerError::FileNotFound { .. })));

        // Test reading directory as file
        let dir_path = temp_dir.path().join("dir");
        fs::create_dir(&dir_path).unwrap();
        let result = read_file_contents(&dir_path);
        assert!(matches!(result, Err(ComposerError::FileNotFound { .. })));
    }

    #[test]
    fn test_read_file_contents_unicode() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("unicode.txt");

        let content = "Nom: Jos\u{e9} Garc\u{ed}a \u{1f680}";
        fs::write(&file_path, content).unwrap();
        assert_eq!(read_file_contents(&file_path).unwrap(), content);
    }

    #[test]
    fn test_read_file_contents_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("latin1.tex");
        fs::write(&file_path, [0x66, 0x6f, 0xff, 0xfe]).unwrap();

        let result = read_file_contents(&file_path);
        assert!(matches!(result, Err(ComposerError::InvalidUtf8 { .. })));
    }

    #[test]
    fn test_write_atomic_creates_parents_and_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("USA").join("_base_x").join("resume.tex");

        write_atomic(&target, "first").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "first");

        write_atomic(&target, "second").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "second");

        // No temporary files left behind
        let entries = fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_safe_join() {
        let base = Path::new("/out");
        assert_eq!(
            safe_join(base, Path::new("USA/resume_USA_x.tex")).unwrap(),
            PathBuf::from("/out/USA/resume_USA_x.tex")
        );

        for bad in ["../escape.tex", "/etc/passwd", "a/../../b", ""] {
            let result = safe_join(base, Path::new(bad));
            assert!(
                matches!(result, Err(ComposerError::PathTraversal { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
