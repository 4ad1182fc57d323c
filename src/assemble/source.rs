//! Input enumeration. Every input (a directory tree, an archive or a single
//! file) is presented to an [`EntryVisitor`] as a sequence of entries with
//! their metadata, in the order the input exposes them.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::RepackError;

/// Metadata of one input entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// `/`-separated path relative to the input root, without a trailing `/`.
    pub path: String,
    pub is_dir: bool,
    pub last_modified: Option<zip::DateTime>,
    /// Unix permission bits, when the input records them.
    pub mode: Option<u32>,
    pub size: u64,
}

pub trait EntryVisitor {
    fn visit_entry(&mut self, entry: &SourceEntry, content: &mut dyn Read) -> Result<(), RepackError>;

    /// Called for archives found inside a directory tree.
    fn visit_archive(&mut self, entry: &SourceEntry, archive: &Path) -> Result<(), RepackError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Directory(PathBuf),
    Archive(PathBuf),
    File(PathBuf),
}

impl InputSource {
    pub fn open(path: &Path) -> Result<Self, RepackError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RepackError::InputNotFound(path.to_path_buf()),
            _ => RepackError::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        Ok(if metadata.is_dir() {
            InputSource::Directory(path.to_path_buf())
        } else if is_archive_name(&path.to_string_lossy()) {
            InputSource::Archive(path.to_path_buf())
        } else {
            InputSource::File(path.to_path_buf())
        })
    }

    pub fn path(&self) -> &Path {
        match self {
            InputSource::Directory(p) | InputSource::Archive(p) | InputSource::File(p) => p,
        }
    }

    /// Feeds every entry to `visitor`. Errors are tagged with the entry and
    /// the input they came from.
    pub fn accept(&self, visitor: &mut dyn EntryVisitor) -> Result<(), RepackError> {
        match self {
            InputSource::Directory(root) => accept_directory(root, visitor),
            InputSource::Archive(path) => accept_archive(path, visitor),
            InputSource::File(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let metadata = fs::metadata(path).map_err(|e| read_error(path, e))?;
                let entry = filesystem_entry(name, &metadata);
                let mut file = File::open(path).map_err(|e| read_error(path, e))?;
                visitor
                    .visit_entry(&entry, &mut file)
                    .map_err(|e| e.in_entry(&entry.path, path))
            }
        }
    }
}

pub(crate) fn is_archive_name(name: &str) -> bool {
    name.ends_with(".jar")
}

fn accept_directory(root: &Path, visitor: &mut dyn EntryVisitor) -> Result<(), RepackError> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for dir_entry in walker {
        let dir_entry = dir_entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            RepackError::Read {
                source: e.into(),
                path,
            }
        })?;

        let relative = dir_entry.path().strip_prefix(root).unwrap_or(dir_entry.path());
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let metadata = dir_entry
            .metadata()
            .map_err(|e| read_error(dir_entry.path(), e.into()))?;
        let entry = filesystem_entry(name, &metadata);

        let result = if entry.is_dir {
            visitor.visit_entry(&entry, &mut io::empty())
        } else if is_archive_name(&entry.path) {
            visitor.visit_archive(&entry, dir_entry.path())
        } else {
            let mut file = File::open(dir_entry.path()).map_err(|e| read_error(dir_entry.path(), e))?;
            visitor.visit_entry(&entry, &mut file)
        };
        result.map_err(|e| e.in_entry(&entry.path, root))?;
    }

    Ok(())
}

fn accept_archive(path: &Path, visitor: &mut dyn EntryVisitor) -> Result<(), RepackError> {
    let file = File::open(path).map_err(|e| read_error(path, e))?;
    let mut archive = ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let mut zip_entry = archive.by_index(index)?;
        let entry = SourceEntry {
            path: zip_entry.name().trim_end_matches('/').to_string(),
            is_dir: zip_entry.is_dir(),
            last_modified: zip_entry.last_modified(),
            mode: zip_entry.unix_mode(),
            size: zip_entry.size(),
        };

        visitor
            .visit_entry(&entry, &mut zip_entry)
            .map_err(|e| e.in_entry(&entry.path, path))?;
    }

    Ok(())
}

fn filesystem_entry(path: String, metadata: &fs::Metadata) -> SourceEntry {
    SourceEntry {
        path,
        is_dir: metadata.is_dir(),
        last_modified: metadata.modified().ok().and_then(zip_time),
        mode: unix_mode(metadata),
        size: if metadata.is_dir() { 0 } else { metadata.len() },
    }
}

/// ZIP timestamps have two-second resolution and cannot predate 1980.
fn zip_time(time: SystemTime) -> Option<zip::DateTime> {
    zip::DateTime::try_from(time::OffsetDateTime::from(time)).ok()
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &fs::Metadata) -> Option<u32> {
    None
}

fn read_error(path: &Path, source: io::Error) -> RepackError {
    RepackError::Read {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[derive(Default)]
    struct Recorder {
        entries: Vec<(String, bool, Vec<u8>)>,
        archives: Vec<String>,
    }

    impl EntryVisitor for Recorder {
        fn visit_entry(&mut self, entry: &SourceEntry, content: &mut dyn Read) -> Result<(), RepackError> {
            let mut data = Vec::new();
            content.read_to_end(&mut data)?;
            self.entries.push((entry.path.clone(), entry.is_dir, data));
            Ok(())
        }

        fn visit_archive(&mut self, entry: &SourceEntry, _archive: &Path) -> Result<(), RepackError> {
            self.archives.push(entry.path.clone());
            Ok(())
        }
    }

    #[test]
    fn open_classifies_inputs() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        let text = dir.path().join("notes.txt");
        fs::write(&jar, b"").unwrap();
        fs::write(&text, b"").unwrap();

        assert_eq!(
            InputSource::open(dir.path()).unwrap(),
            InputSource::Directory(dir.path().to_path_buf())
        );
        assert_eq!(InputSource::open(&jar).unwrap(), InputSource::Archive(jar.clone()));
        assert_eq!(InputSource::open(&text).unwrap(), InputSource::File(text.clone()));
        assert!(matches!(
            InputSource::open(&dir.path().join("missing.jar")),
            Err(RepackError::InputNotFound(_))
        ));
    }

    #[test]
    fn directory_entries_are_sorted_and_relative() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("org/b")).unwrap();
        fs::create_dir_all(dir.path().join("org/a")).unwrap();
        fs::write(dir.path().join("org/b/B.class"), b"b").unwrap();
        fs::write(dir.path().join("org/a/A.class"), b"a").unwrap();
        fs::write(dir.path().join("lib.jar"), b"").unwrap();

        let mut recorder = Recorder::default();
        InputSource::open(dir.path()).unwrap().accept(&mut recorder).unwrap();

        let names: Vec<_> = recorder
            .entries
            .iter()
            .map(|(p, d, _)| (p.as_str(), *d))
            .collect();
        assert_eq!(
            names,
            [
                ("org", true),
                ("org/a", true),
                ("org/a/A.class", false),
                ("org/b", true),
                ("org/b/B.class", false),
            ]
        );
        assert_eq!(recorder.entries[2].2, b"a");
        assert_eq!(recorder.archives, ["lib.jar"]);
    }

    #[test]
    fn archive_entries_keep_archive_order() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("in.jar");
        let mut zip = ZipWriter::new(File::create(&jar).unwrap());
        zip.add_directory("z/", SimpleFileOptions::default()).unwrap();
        zip.start_file("z/Last.class", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"last").unwrap();
        zip.start_file("a.txt", SimpleFileOptions::default().unix_permissions(0o640))
            .unwrap();
        zip.write_all(b"first").unwrap();
        zip.finish().unwrap();

        let mut recorder = Recorder::default();
        InputSource::open(&jar).unwrap().accept(&mut recorder).unwrap();

        let names: Vec<_> = recorder.entries.iter().map(|(p, _, _)| p.as_str()).collect();
        assert_eq!(names, ["z", "z/Last.class", "a.txt"]);
        assert!(recorder.entries[0].1);
        assert_eq!(recorder.entries[2].2, b"first");
    }

    #[test]
    fn loose_file_is_one_entry() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("LICENSE");
        fs::write(&file, b"MIT").unwrap();

        let mut recorder = Recorder::default();
        InputSource::open(&file).unwrap().accept(&mut recorder).unwrap();
        assert_eq!(recorder.entries, [("LICENSE".to_string(), false, b"MIT".to_vec())]);
    }

    #[test]
    fn visitor_errors_carry_entry_and_input() {
        struct Failing;
        impl EntryVisitor for Failing {
            fn visit_entry(&mut self, _: &SourceEntry, _: &mut dyn Read) -> Result<(), RepackError> {
                Err(RepackError::InvalidPattern {
                    pattern: "x".into(),
                    reason: "boom".into(),
                })
            }
            fn visit_archive(&mut self, _: &SourceEntry, _: &Path) -> Result<(), RepackError> {
                Ok(())
            }
        }

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"").unwrap();
        let err = InputSource::open(dir.path()).unwrap().accept(&mut Failing).unwrap_err();
        match err {
            RepackError::Entry { entry, input, .. } => {
                assert_eq!(entry, "a.txt");
                assert_eq!(input, dir.path());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
