//! Module archive synthesis.
//!
//! An archive is a gzip-compressed tar stream holding one module's files,
//! with the `<module>/` prefix stripped from every entry name. The module
//! registry client unpacks it directly into the module's source directory.
//!
//! Archives are deterministic: entries are written in the order produced by
//! [`partition_by_module`](crate::partition_by_module), every header carries
//! mtime 0, uid/gid 0 and no owner names, and the gzip header has no
//! timestamp. The same module file set always yields the same bytes.

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};
use tar::{EntryType, Header};

use crate::error::{Error, Result};
use crate::module::{module_files, module_of, partition_by_module};
use crate::store::{FileEntry, ResolvedTree};

/// Streaming writer for a single module archive.
///
/// # Examples
///
/// ```rust
/// use monoreg_core::ArchiveWriter;
///
/// let mut writer = ArchiveWriter::new("docker", Vec::new());
/// writer.append_file("main.tf", 0o644, b"resource x {}")?;
/// let bytes = writer.finish()?;
/// assert!(!bytes.is_empty());
/// # Ok::<(), monoreg_core::Error>(())
/// ```
pub struct ArchiveWriter<W: Write> {
    module: String,
    builder: tar::Builder<GzEncoder<W>>,
    entries: usize,
}

impl<W: Write> std::fmt::Debug for ArchiveWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("module", &self.module)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl<W: Write> ArchiveWriter<W> {
    /// Starts an archive for `module` that writes into `sink`.
    pub fn new(module: impl Into<String>, sink: W) -> Self {
        let encoder = GzBuilder::new().mtime(0).write(sink, Compression::default());
        Self {
            module: module.into(),
            builder: tar::Builder::new(encoder),
            entries: 0,
        }
    }

    /// Returns the number of entries written so far.
    #[must_use]
    pub const fn entries(&self) -> usize {
        self.entries
    }

    /// Appends a regular file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArchiveWrite`] if the sink rejects the header or data.
    pub fn append_file(&mut self, name: &str, mode: u32, contents: &[u8]) -> Result<()> {
        let mut header = Self::header(EntryType::Regular, mode);
        header.set_size(contents.len() as u64);
        self.builder
            .append_data(&mut header, name, contents)
            .map_err(|source| self.write_error(source))?;
        self.entries += 1;
        Ok(())
    }

    /// Appends a symbolic link pointing at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArchiveWrite`] if the sink rejects the header.
    pub fn append_symlink(&mut self, name: &str, target: &str) -> Result<()> {
        let mut header = Self::header(EntryType::Symlink, 0o777);
        header.set_size(0);
        self.builder
            .append_link(&mut header, name, target)
            .map_err(|source| self.write_error(source))?;
        self.entries += 1;
        Ok(())
    }

    /// Writes the tar trailer, flushes the compressor and returns the sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArchiveWrite`] if the trailer or gzip footer cannot be
    /// written.
    pub fn finish(self) -> Result<W> {
        let module = self.module;
        let wrap = |source| Error::ArchiveWrite {
            module: module.clone(),
            source,
        };
        let encoder = self.builder.into_inner().map_err(wrap)?;
        encoder.finish().map_err(wrap)
    }

    fn header(kind: EntryType, mode: u32) -> Header {
        let mut header = Header::new_gnu();
        header.set_entry_type(kind);
        header.set_mode(mode);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        Error::ArchiveWrite {
            module: self.module.clone(),
            source,
        }
    }
}

/// Writes the archive of `module` from `files` into `sink`.
///
/// `files` should be the module's entries in partition order; entries that
/// do not belong to `module` are skipped. Contents are read from `tree`.
///
/// # Errors
///
/// - [`Error::TreeRead`] if a blob cannot be read
/// - [`Error::ArchiveWrite`] if writing to `sink` fails
pub fn build_archive<W: Write>(
    module: &str,
    files: &[FileEntry],
    tree: &ResolvedTree<'_>,
    sink: W,
) -> Result<W> {
    let mut writer = ArchiveWriter::new(module, sink);

    for entry in files {
        let Some(name) = module_of(&entry.path)
            .filter(|(m, _)| *m == module)
            .map(|(_, rest)| rest)
        else {
            tracing::warn!(module, path = %entry.path, "Skipping file outside module");
            continue;
        };

        if entry.is_symlink() {
            let target = String::from_utf8(tree.read(entry)?).map_err(|_| Error::TreeRead {
                path: entry.path.clone(),
                message: "symlink target is not valid UTF-8".to_string(),
            })?;
            writer.append_symlink(name, &target)?;
        } else {
            tree.with_contents(entry, |contents| {
                writer.append_file(name, entry.permissions(), contents)
            })??;
        }
    }

    tracing::debug!(
        module,
        tag = tree.tag(),
        entries = writer.entries(),
        "Built module archive"
    );

    writer.finish()
}

/// Returns a valid archive with no entries.
///
/// # Errors
///
/// Returns [`Error::ArchiveWrite`] if compression fails.
pub fn empty_archive() -> Result<Vec<u8>> {
    ArchiveWriter::new("", Vec::new()).finish()
}

/// Builds the archive of one module at the given tree.
///
/// A module with no files at this tree yields an empty archive.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or the archive cannot be
/// written.
pub fn synthesize(tree: &ResolvedTree<'_>, module: &str) -> Result<Vec<u8>> {
    let files = module_files(tree.files().collect::<Result<Vec<_>>>()?, module);
    build_archive(module, &files, tree, Vec::new())
}

/// Builds the archive of every module present in the tree.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or any archive cannot be
/// written; no partial result is returned.
pub fn synthesize_all(tree: &ResolvedTree<'_>) -> Result<BTreeMap<String, Vec<u8>>> {
    let modules = partition_by_module(tree.files().collect::<Result<Vec<_>>>()?);

    let mut archives = BTreeMap::new();
    for (module, files) in modules {
        let bytes = build_archive(&module, &files, tree, Vec::new())?;
        archives.insert(module, bytes);
    }
    Ok(archives)
}

/// Computes the SHA-256 digest of archive bytes as `sha256:<hex>`.
#[must_use]
pub fn archive_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
