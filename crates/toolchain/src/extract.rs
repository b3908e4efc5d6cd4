//! Archive extraction with containment checks.
//!
//! Release archives are gzip-compressed tarballs downloaded from the
//! network. Even after verification they are treated as hostile input at the
//! filesystem boundary: every entry path and symlink target is validated to
//! stay inside the destination directory before anything is written.

use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt, symlink};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Extract every entry of `archive_path` into `dest`.
///
/// Regular files keep the mode stored in their header and are copied through
/// a reader capped at the header's declared size. Directories are created
/// with mode 0750. Symlinks are created only after their target is proven to
/// resolve inside `dest`. Device nodes and other entry types are skipped.
///
/// # Errors
///
/// Fails on structural archive errors and on any entry whose path or symlink
/// target would land outside `dest`. Entries already written before a
/// failure are left in place; the failing file itself is removed.
pub fn extract_all(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    fs::create_dir_all(dest)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.into_owned();
        let target = safe_join(dest, &name)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                if !target.exists() {
                    fs::DirBuilder::new().recursive(true).mode(0o750).create(&target)?;
                }
            }
            EntryType::Regular => {
                write_regular(&mut entry, &target)?;
            }
            EntryType::Symlink => {
                let link = entry
                    .link_name()?
                    .ok_or_else(|| Error::unsafe_entry(name.to_string_lossy()))?;
                validate_link_target(dest, &target, &link)
                    .map_err(|_| Error::unsafe_entry(name.to_string_lossy()))?;
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                if target.exists() || target.is_symlink() {
                    fs::remove_file(&target)?;
                }
                symlink(&link, &target)?;
            }
            other => {
                trace!(entry = %name.display(), ?other, "Skipping unsupported entry type");
            }
        }
    }

    debug!(archive = %archive_path.display(), dest = %dest.display(), "Extracted archive");
    Ok(())
}

/// Extract the first regular-file entry whose base name is `base_name` to
/// `dest_path`, with executable permissions.
///
/// # Errors
///
/// Returns [`Error::BinaryNotFound`] when the archive holds no matching
/// regular file.
pub fn extract_one(archive_path: &Path, dest_path: &Path, base_name: &str) -> Result<PathBuf> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        let matches = entry
            .path()?
            .file_name()
            .is_some_and(|f| f == base_name);
        if !matches {
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_regular(&mut entry, dest_path)?;
        set_executable(dest_path)?;
        debug!(binary = base_name, dest = %dest_path.display(), "Extracted binary");
        return Ok(dest_path.to_path_buf());
    }

    Err(Error::BinaryNotFound(base_name.to_string()))
}

/// Mark `path` executable (mode 0755).
pub fn set_executable(path: &Path) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

/// Write one regular-file entry to `target`, truncating any existing file.
///
/// The copy is bounded by the size declared in the entry header so a
/// corrupt or malicious stream cannot write more than it announced. A
/// partially written file is removed before the error is returned.
fn write_regular<R: Read>(entry: &mut tar::Entry<'_, R>, target: &Path) -> Result<()> {
    let size = entry.header().size()?;
    let mode = entry.header().mode().unwrap_or(0o644) & 0o7777;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut out = File::create(target)?;
    let mut limited = entry.take(size);
    if let Err(err) = io::copy(&mut limited, &mut out) {
        drop(out);
        let _ = fs::remove_file(target);
        return Err(err.into());
    }

    fs::set_permissions(target, fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Join an archive entry name onto `dest`, lexically, refusing any shape
/// that would resolve outside `dest`.
fn safe_join(dest: &Path, name: &Path) -> Result<PathBuf> {
    if name.is_absolute() {
        return Err(Error::unsafe_entry(name.to_string_lossy()));
    }
    let mut cleaned = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    return Err(Error::unsafe_entry(name.to_string_lossy()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::unsafe_entry(name.to_string_lossy()));
            }
        }
    }
    Ok(dest.join(cleaned))
}

/// Check that a symlink target resolves inside `dest`.
///
/// Absolute targets are taken as-is; relative targets are resolved against
/// the symlink's containing directory. Both are cleaned lexically before the
/// containment check - the link is never created first.
fn validate_link_target(dest: &Path, entry_dest: &Path, target: &Path) -> Result<()> {
    let resolved = if target.is_absolute() {
        lexical_clean(target)
    } else {
        let parent = entry_dest.parent().unwrap_or(dest);
        lexical_clean(&parent.join(target))
    };
    if resolved == dest || resolved.starts_with(dest) {
        Ok(())
    } else {
        Err(Error::unsafe_entry(target.to_string_lossy()))
    }
}

/// Lexical path normalization: resolves `.` and `..` without touching the
/// filesystem. `..` above the root is preserved so the containment check
/// fails instead of wrapping around.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tar::Builder;
    use tempfile::TempDir;

    fn create_test_tarball(dir: &Path, files: &[(&str, &[u8], u32)]) -> PathBuf {
        let tarball_path = dir.join("test.tar.gz");
        let file = File::create(&tarball_path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);

        for (path, content, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append(&header, &content[..]).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
        tarball_path
    }

    /// Build a tarball containing a single entry whose raw header name is
    /// written verbatim, bypassing the builder's own path validation.
    fn create_tarball_with_raw_name(dir: &Path, raw_name: &[u8], content: &[u8]) -> PathBuf {
        let tarball_path = dir.join("evil.tar.gz");
        let file = File::create(&tarball_path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);

        let mut header = tar::Header::new_gnu();
        header.as_gnu_mut().unwrap().name[..raw_name.len()].copy_from_slice(raw_name);
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, content).unwrap();

        builder.into_inner().unwrap().finish().unwrap();
        tarball_path
    }

    fn create_tarball_with_symlink(dir: &Path, link: &str, target: &str) -> PathBuf {
        let tarball_path = dir.join("links.tar.gz");
        let file = File::create(&tarball_path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);

        let mut header = tar::Header::new_gnu();
        header.set_path("real.txt").unwrap();
        header.set_size(4);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &b"data"[..]).unwrap();

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_path(link).unwrap();
        header.set_link_name(target).unwrap();
        header.set_size(0);
        header.set_cksum();
        builder.append(&header, io::empty()).unwrap();

        builder.into_inner().unwrap().finish().unwrap();
        tarball_path
    }

    #[test]
    fn test_extract_all_writes_files_with_modes() {
        let temp = TempDir::new().unwrap();
        let tarball = create_test_tarball(
            temp.path(),
            &[
                ("bin/tool", b"#!/bin/sh\n", 0o755),
                ("share/doc.txt", b"docs", 0o644),
            ],
        );

        let dest = temp.path().join("out");
        extract_all(&tarball, &dest).unwrap();

        let tool = dest.join("bin").join("tool");
        assert_eq!(fs::read(&tool).unwrap(), b"#!/bin/sh\n");
        assert_eq!(fs::metadata(&tool).unwrap().permissions().mode() & 0o777, 0o755);
        assert_eq!(
            fs::metadata(dest.join("share").join("doc.txt"))
                .unwrap()
                .permissions()
                .mode()
                & 0o777,
            0o644
        );
    }

    #[test]
    fn test_extract_all_truncates_existing_file() {
        let temp = TempDir::new().unwrap();
        let tarball = create_test_tarball(temp.path(), &[("file.txt", b"new", 0o644)]);

        let dest = temp.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("file.txt"), b"something much longer than new").unwrap();

        extract_all(&tarball, &dest).unwrap();
        assert_eq!(fs::read(dest.join("file.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_extract_all_rejects_parent_traversal() {
        let temp = TempDir::new().unwrap();
        let tarball =
            create_tarball_with_raw_name(temp.path(), b"../../etc/passwd", b"oops");

        let dest = temp.path().join("deep").join("nested").join("out");
        fs::create_dir_all(&dest).unwrap();
        let err = extract_all(&tarball, &dest).unwrap_err();

        assert!(matches!(err, Error::UnsafeArchiveEntry { .. }));
        assert!(!temp.path().join("etc").exists());
        assert!(!temp.path().join("deep").join("etc").exists());
    }

    #[test]
    fn test_extract_all_rejects_absolute_path() {
        let temp = TempDir::new().unwrap();
        let victim = temp.path().join("victim.txt");
        let raw = victim.to_str().unwrap().as_bytes().to_vec();
        let tarball = create_tarball_with_raw_name(temp.path(), &raw, b"oops");

        let dest = temp.path().join("out");
        let err = extract_all(&tarball, &dest).unwrap_err();

        assert!(matches!(err, Error::UnsafeArchiveEntry { .. }));
        assert!(!victim.exists());
    }

    #[test]
    fn test_extract_all_rejects_symlink_escape() {
        let temp = TempDir::new().unwrap();
        let tarball = create_tarball_with_symlink(temp.path(), "link", "../../outside");

        let dest = temp.path().join("a").join("b");
        fs::create_dir_all(&dest).unwrap();
        let err = extract_all(&tarball, &dest).unwrap_err();

        assert!(matches!(err, Error::UnsafeArchiveEntry { .. }));
        assert!(!dest.join("link").is_symlink());
    }

    #[test]
    fn test_extract_all_allows_internal_symlink() {
        let temp = TempDir::new().unwrap();
        let tarball = create_tarball_with_symlink(temp.path(), "alias.txt", "real.txt");

        let dest = temp.path().join("out");
        extract_all(&tarball, &dest).unwrap();

        assert!(dest.join("alias.txt").is_symlink());
        assert_eq!(fs::read(dest.join("alias.txt")).unwrap(), b"data");
    }

    #[test]
    fn test_extract_one_by_base_name() {
        let temp = TempDir::new().unwrap();
        let tarball = create_test_tarball(
            temp.path(),
            &[
                ("mise-v1/README.md", b"readme", 0o644),
                ("mise-v1/bin/mise", b"#!/bin/sh\necho hi\n", 0o755),
            ],
        );

        let dest = temp.path().join("bin").join("mise");
        let path = extract_one(&tarball, &dest, "mise").unwrap();

        assert_eq!(path, dest);
        assert_eq!(fs::read(&dest).unwrap(), b"#!/bin/sh\necho hi\n");
        assert_ne!(fs::metadata(&dest).unwrap().permissions().mode() & 0o111, 0);
    }

    #[test]
    fn test_extract_one_missing_binary() {
        let temp = TempDir::new().unwrap();
        let tarball = create_test_tarball(temp.path(), &[("other/file", b"x", 0o644)]);

        let dest = temp.path().join("bin").join("mise");
        let err = extract_one(&tarball, &dest, "mise").unwrap_err();

        assert!(matches!(err, Error::BinaryNotFound(ref name) if name == "mise"));
        assert!(!dest.exists());
    }

    #[test]
    fn test_extract_one_never_writes_outside_dest() {
        let temp = TempDir::new().unwrap();
        let tarball =
            create_tarball_with_raw_name(temp.path(), b"../../etc/passwd", b"oops");

        let dest = temp.path().join("bin").join("chezmoi");
        let err = extract_one(&tarball, &dest, "chezmoi").unwrap_err();

        assert!(matches!(err, Error::BinaryNotFound(_)));
        assert!(!temp.path().join("etc").exists());
    }

    #[test]
    fn test_safe_join_cases() {
        let dest = Path::new("/install/out");

        assert_eq!(
            safe_join(dest, Path::new("a/b.txt")).unwrap(),
            PathBuf::from("/install/out/a/b.txt")
        );
        assert_eq!(
            safe_join(dest, Path::new("./a/../b.txt")).unwrap(),
            PathBuf::from("/install/out/b.txt")
        );
        assert!(safe_join(dest, Path::new("../escape")).is_err());
        assert!(safe_join(dest, Path::new("a/../../escape")).is_err());
        assert!(safe_join(dest, Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_set_executable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tool");
        fs::write(&path, b"bin").unwrap();

        set_executable(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o755);
    }
}
