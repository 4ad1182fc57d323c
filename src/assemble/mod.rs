//! Merges all inputs into one archive in a single sequential pass.
//!
//! Per entry the assembler decides between directory bookkeeping, class
//! rewriting, handing the resource to transformers, or a plain copy. The
//! first entry written at a given output path wins; later ones are dropped.
//! Directory entries are emitted lazily, right before the first file that
//! needs them, parents before children.

pub mod exclude;
pub mod path;
pub mod source;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::classfile::ClassRewriter;
use crate::config::EntryCompression;
use crate::error::RepackError;
use crate::relocate::{Relocator, SymbolRemapper};
use crate::transform::{OutputSink, ResourceTransformer, TransformContext};

pub use exclude::ExcludeFilter;
pub use path::ArchiveEntryPath;
pub use source::{EntryVisitor, InputSource, SourceEntry};

const VERSIONS_DIR: &str = "META-INF/versions/";
const CLASS_SUFFIX: &str = ".class";
/// Entries larger than this need ZIP64 headers.
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Everything one run needs.
#[derive(Debug)]
pub struct RepackTask {
    pub inputs: Vec<PathBuf>,
    pub destination: PathBuf,
    pub relocators: Vec<Relocator>,
    pub transformers: Vec<Box<dyn ResourceTransformer>>,
    pub exclude: ExcludeFilter,
    pub compression: EntryCompression,
    pub verbose: bool,
}

/// Splits `META-INF/versions/<n>/rest` into the versioned prefix (including
/// its trailing `/`) and `rest`. Paths outside the versions tree yield an
/// empty prefix.
pub(crate) fn split_versions_prefix(path: &str) -> (&str, &str) {
    if let Some(rest) = path.strip_prefix(VERSIONS_DIR) {
        if let Some(slash) = rest.find('/') {
            let version = &rest[..slash];
            if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) {
                let split = VERSIONS_DIR.len() + slash + 1;
                return (&path[..split], &path[split..]);
            }
        }
    }
    ("", path)
}

/// Writes the merged archive to `task.destination`.
///
/// The archive is assembled in a temporary file next to the destination and
/// only moved into place once everything succeeded.
pub fn repackage(task: &mut RepackTask) -> Result<PathBuf, RepackError> {
    let destination = task.destination.clone();
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|source| write_error(&dir, source))?;

    let mut temp = NamedTempFile::new_in(&dir).map_err(|source| write_error(&dir, source))?;
    {
        let mut writer = assemble(task, BufWriter::new(temp.as_file_mut()))?;
        writer.flush().map_err(|source| write_error(&destination, source))?;
    }

    temp.persist(&destination)
        .map_err(|e| write_error(&destination, e.error))?;

    tracing::info!("wrote {}", destination.display());
    Ok(destination)
}

/// Runs the merge into any seekable writer and returns it once the archive
/// is complete.
pub fn assemble<W: Write + Seek>(task: &mut RepackTask, writer: W) -> Result<W, RepackError> {
    let mut assembler = Assembler {
        writer: ZipWriter::new(writer),
        remapper: SymbolRemapper::new(&task.relocators),
        transformers: &mut task.transformers,
        exclude: &task.exclude,
        compression: task.compression.method(),
        verbose: task.verbose,
        visited_dirs: HashSet::new(),
        visited_files: HashSet::new(),
        dir_meta: HashMap::new(),
    };

    for pattern in task.exclude.patterns() {
        tracing::debug!("excluding classes matching {pattern}");
    }

    for input in &task.inputs {
        let source = InputSource::open(input)?;
        tracing::debug!("reading input {}", source.path().display());
        source.accept(&mut assembler)?;
    }

    assembler.finish()
}

/// Timestamp and permissions recorded for a directory seen in an input.
#[derive(Debug, Clone, Copy)]
struct DirMeta {
    last_modified: Option<zip::DateTime>,
    mode: Option<u32>,
}

struct Assembler<'t, W: Write + Seek> {
    writer: ZipWriter<W>,
    remapper: SymbolRemapper<'t>,
    transformers: &'t mut [Box<dyn ResourceTransformer>],
    exclude: &'t ExcludeFilter,
    compression: CompressionMethod,
    verbose: bool,
    visited_dirs: HashSet<String>,
    visited_files: HashSet<String>,
    dir_meta: HashMap<String, DirMeta>,
}

impl<'t, W: Write + Seek> Assembler<'t, W> {
    fn finish(mut self) -> Result<W, RepackError> {
        let transformers = std::mem::take(&mut self.transformers);
        for transformer in transformers.iter_mut() {
            if transformer.has_transformed_resource() {
                tracing::debug!("flushing {}", transformer.name());
                transformer.flush(&mut self)?;
            }
        }

        Ok(self.writer.finish()?)
    }

    fn log_source(&self, path: &str) {
        if self.verbose {
            tracing::info!("source file: {path}");
        } else {
            tracing::debug!("source file: {path}");
        }
    }

    /// Output path of a class: any versions prefix stays verbatim, the rest
    /// is remapped without its extension.
    fn map_class_path(&self, path: &str) -> String {
        let (prefix, rest) = split_versions_prefix(path);
        let stem = self.remapper.map_resource_path(rest).unwrap_or_else(|| {
            rest.find('.').map_or(rest, |dot| &rest[..dot]).to_string()
        });
        format!("{prefix}{stem}{CLASS_SUFFIX}")
    }

    fn record_directory(&mut self, entry: &SourceEntry) {
        let target = self.remapper.safe_map(&entry.path);
        self.dir_meta.entry(target).or_insert(DirMeta {
            last_modified: entry.last_modified,
            mode: entry.mode,
        });
    }

    /// Marks `target` as written; `false` if an earlier entry already took it.
    fn claim(&mut self, target: &str) -> bool {
        if self.visited_files.insert(target.to_string()) {
            true
        } else {
            tracing::debug!("skipping duplicate entry {target}");
            false
        }
    }

    fn add_parent_directories(&mut self, path: &ArchiveEntryPath) -> Result<(), RepackError> {
        match path.parent() {
            Some(parent) => self.add_directory(&parent),
            None => Ok(()),
        }
    }

    fn add_directory(&mut self, dir: &ArchiveEntryPath) -> Result<(), RepackError> {
        let key = dir.path_string();
        if !self.visited_dirs.insert(key.clone()) {
            return Ok(());
        }

        self.add_parent_directories(dir)?;

        let meta = self.dir_meta.get(&key).copied();
        let mut options = SimpleFileOptions::default()
            .last_modified_time(meta.and_then(|m| m.last_modified).unwrap_or_default());
        if let Some(mode) = meta.and_then(|m| m.mode) {
            options = options.unix_permissions(mode);
        }

        self.writer.add_directory(dir.entry_name(), options)?;
        Ok(())
    }

    fn file_options(
        &self,
        last_modified: Option<zip::DateTime>,
        mode: Option<u32>,
        size: u64,
    ) -> SimpleFileOptions {
        let options = SimpleFileOptions::default()
            .compression_method(self.compression)
            .last_modified_time(last_modified.unwrap_or_default())
            .large_file(size >= ZIP64_THRESHOLD);
        match mode {
            Some(mode) => options.unix_permissions(mode),
            None => options,
        }
    }

    fn start_file(&mut self, target: &str, options: SimpleFileOptions) -> Result<(), RepackError> {
        self.add_parent_directories(&ArchiveEntryPath::parse(target))?;
        self.writer.start_file(target, options)?;
        Ok(())
    }

    fn remap_class(&mut self, entry: &SourceEntry, content: &mut dyn Read) -> Result<(), RepackError> {
        let target = self.map_class_path(&entry.path);
        if !self.claim(&target) {
            return Ok(());
        }

        let mut data = Vec::new();
        content.read_to_end(&mut data)?;
        let rewritten = ClassRewriter::new(self.remapper)
            .rewrite(&data)
            .map_err(|source| RepackError::ClassRemap {
                path: entry.path.clone(),
                source,
            })?;

        if self.verbose && target != entry.path {
            tracing::info!("relocated class {} -> {target}", entry.path);
        }

        let options = self.file_options(entry.last_modified, None, rewritten.len() as u64);
        self.start_file(&target, options)?;
        self.writer.write_all(&rewritten)?;
        Ok(())
    }

    fn transform(&mut self, entry: &SourceEntry, content: &mut dyn Read) -> Result<(), RepackError> {
        let mut data = Vec::new();
        content.read_to_end(&mut data)?;
        let mapped = self.remapper.safe_map(&entry.path);

        for transformer in self.transformers.iter_mut() {
            if transformer.can_transform_resource(&entry.path) {
                tracing::debug!("{} takes {}", transformer.name(), entry.path);
                transformer.transform(TransformContext {
                    path: &mapped,
                    content: &data,
                    relocators: self.remapper.relocators(),
                })?;
            }
        }
        Ok(())
    }

    fn copy(&mut self, entry: &SourceEntry, content: &mut dyn Read) -> Result<(), RepackError> {
        let target = self.remapper.safe_map(&entry.path);
        if !self.claim(&target) {
            return Ok(());
        }

        let options = self.file_options(entry.last_modified, entry.mode, entry.size);
        self.start_file(&target, options)?;
        io::copy(content, &mut self.writer)?;
        Ok(())
    }
}

impl<'t, W: Write + Seek> EntryVisitor for Assembler<'t, W> {
    fn visit_entry(&mut self, entry: &SourceEntry, content: &mut dyn Read) -> Result<(), RepackError> {
        if entry.is_dir {
            self.record_directory(entry);
            return Ok(());
        }

        self.log_source(&entry.path);

        if self.exclude.is_excluded(&entry.path) {
            tracing::debug!("excluded {}", entry.path);
            return Ok(());
        }

        let path = ArchiveEntryPath::parse(&entry.path);
        if self.remapper.has_relocators() && path.is_class_file() {
            self.remap_class(entry, content)
        } else if self
            .transformers
            .iter()
            .any(|t| t.can_transform_resource(&entry.path))
        {
            self.transform(entry, content)
        } else {
            self.copy(entry, content)
        }
    }

    fn visit_archive(&mut self, entry: &SourceEntry, archive: &Path) -> Result<(), RepackError> {
        self.log_source(&entry.path);
        InputSource::Archive(archive.to_path_buf()).accept(self)
    }
}

impl<'t, W: Write + Seek> OutputSink for Assembler<'t, W> {
    fn write_entry(&mut self, path: &str, content: &[u8]) -> Result<(), RepackError> {
        if !self.claim(path) {
            return Ok(());
        }
        let options = self.file_options(None, None, content.len() as u64);
        self.start_file(path, options)?;
        self.writer.write_all(content)?;
        Ok(())
    }
}

fn write_error(path: &Path, source: io::Error) -> RepackError {
    RepackError::Write {
        path: path.to_path_buf(),
        source,
    }
}
