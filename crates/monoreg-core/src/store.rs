//! Read-only access to the module monorepo's git history.
//!
//! [`VersionStore`] translates between tag names and file trees. It is opened
//! once at startup and shared by reference; every caller checks out its own
//! repository handle from a small pool, so concurrent readers never contend
//! on a lock while walking trees or reading blobs.
//!
//! # Examples
//!
//! ```rust,no_run
//! use monoreg_core::VersionStore;
//!
//! let store = VersionStore::open("/srv/modules")?;
//! for tag in store.list_tags()? {
//!     let handle = store.checkout()?;
//!     let tree = handle.resolve_tag(&tag)?;
//!     for file in tree.files() {
//!         println!("{tag}: {}", file?.path);
//!     }
//! }
//! # Ok::<(), monoreg_core::Error>(())
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use git2::{ErrorCode, ObjectType, Oid, Repository};
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Maximum number of idle repository handles kept for reuse.
const MAX_IDLE_HANDLES: usize = 16;

/// Git file mode of an executable blob.
const MODE_EXECUTABLE: u32 = 0o100_755;

/// Git file mode of a symbolic link.
const MODE_SYMLINK: u32 = 0o120_000;

/// A git repository opened for reading tags and historical trees.
pub struct VersionStore {
    /// Location of the git directory (`.git` of a clone, or a bare repository).
    git_dir: PathBuf,
    /// Handles not currently checked out.
    idle: Mutex<Vec<Repository>>,
}

impl fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionStore")
            .field("git_dir", &self.git_dir)
            .field("idle_handles", &self.idle.lock().len())
            .finish()
    }
}

impl VersionStore {
    /// Opens a working clone or bare repository.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepositoryOpen`] if `path` is not a git repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|source| Error::RepositoryOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let git_dir = repo.path().to_path_buf();

        tracing::debug!(git_dir = %git_dir.display(), "Opened version store");

        Ok(Self {
            git_dir,
            idle: Mutex::new(vec![repo]),
        })
    }

    /// Clones `url` as a bare repository into `dest` and opens it.
    ///
    /// Tags reachable from the remote's branches are fetched along with them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepositoryOpen`] if the clone fails.
    pub fn clone_from(url: &str, dest: impl AsRef<Path>) -> Result<Self> {
        let dest = dest.as_ref();
        tracing::info!(url, dest = %dest.display(), "Cloning module repository");

        git2::build::RepoBuilder::new()
            .bare(true)
            .clone(url, dest)
            .map_err(|source| Error::RepositoryOpen {
                path: PathBuf::from(url),
                source,
            })?;

        Self::open(dest)
    }

    /// Returns the git directory this store reads from.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Checks out a repository handle for the calling thread.
    ///
    /// The handle goes back to the pool when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepositoryOpen`] if a new handle has to be opened and
    /// the repository has become unreadable.
    pub fn checkout(&self) -> Result<StoreHandle<'_>> {
        let pooled = self.idle.lock().pop();
        let repo = match pooled {
            Some(repo) => repo,
            None => Repository::open(&self.git_dir).map_err(|source| Error::RepositoryOpen {
                path: self.git_dir.clone(),
                source,
            })?,
        };

        Ok(StoreHandle {
            store: self,
            repo: Some(repo),
        })
    }

    /// Lists every tag name, sorted byte-wise.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag references cannot be read.
    pub fn list_tags(&self) -> Result<Vec<String>> {
        self.checkout()?.list_tags()
    }

    fn release(&self, repo: Repository) {
        let mut idle = self.idle.lock();
        if idle.len() < MAX_IDLE_HANDLES {
            idle.push(repo);
        }
    }
}

/// A repository handle checked out of a [`VersionStore`].
pub struct StoreHandle<'s> {
    store: &'s VersionStore,
    repo: Option<Repository>,
}

impl fmt::Debug for StoreHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("git_dir", &self.store.git_dir)
            .finish_non_exhaustive()
    }
}

impl Drop for StoreHandle<'_> {
    fn drop(&mut self) {
        if let Some(repo) = self.repo.take() {
            self.store.release(repo);
        }
    }
}

impl StoreHandle<'_> {
    fn repo(&self) -> &Repository {
        // Only `drop` takes the repository out.
        self.repo.as_ref().unwrap_or_else(|| unreachable!("handle used after release"))
    }

    /// Lists every tag name, sorted byte-wise.
    ///
    /// Tags whose names are not valid UTF-8 are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TreeRead`] if the tag references cannot be read.
    pub fn list_tags(&self) -> Result<Vec<String>> {
        let names = self
            .repo()
            .tag_names(None)
            .map_err(|e| Error::tree_read("refs/tags", &e))?;

        let mut tags: Vec<String> = names.iter().flatten().map(str::to_owned).collect();
        if tags.len() != names.len() {
            tracing::warn!(
                skipped = names.len() - tags.len(),
                "Ignoring tags with non-UTF-8 names"
            );
        }
        tags.sort_unstable();
        tags.dedup();
        Ok(tags)
    }

    /// Resolves a tag to the tree of the commit it marks.
    ///
    /// Annotated tags are peeled to their target commit (following chains of
    /// tag objects); otherwise the reference is looked up as a commit.
    ///
    /// # Errors
    ///
    /// - [`Error::TagNotFound`] if no tag named `name` exists
    /// - [`Error::CommitResolution`] if the tag's target commit cannot be loaded
    /// - [`Error::TreeRead`] if the commit's tree cannot be loaded
    pub fn resolve_tag(&self, name: &str) -> Result<ResolvedTree<'_>> {
        let repo = self.repo();
        let not_found = || Error::TagNotFound {
            tag: name.to_string(),
        };
        let unresolvable = |message: String| Error::CommitResolution {
            tag: name.to_string(),
            message,
        };

        let reference = match repo.find_reference(&format!("refs/tags/{name}")) {
            Ok(reference) => reference,
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => {
                return Err(not_found());
            }
            Err(e) => return Err(unresolvable(e.message().to_string())),
        };

        let target = reference
            .resolve()
            .map_err(|e| unresolvable(e.message().to_string()))?
            .target()
            .ok_or_else(|| unresolvable("tag reference has no target".to_string()))?;

        let commit = match repo.find_tag(target) {
            Ok(tag) => tag
                .target()
                .and_then(|object| object.peel_to_commit())
                .map_err(|e| unresolvable(e.message().to_string()))?,
            Err(_) => repo
                .find_commit(target)
                .map_err(|e| unresolvable(e.message().to_string()))?,
        };

        let tree = commit.tree().map_err(|e| Error::tree_read("", &e))?;
        let odb = repo.odb().map_err(|e| Error::tree_read("", &e))?;

        tracing::debug!(tag = name, commit = %commit.id(), "Resolved tag");

        Ok(ResolvedTree {
            repo,
            tag: name.to_string(),
            commit: commit.id(),
            tree,
            odb,
        })
    }
}

/// A file leaf of a historical tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Repository-relative path using `/` separators.
    pub path: String,
    /// Blob object id of the file contents.
    pub oid: Oid,
    /// Raw git file mode (`0o100644`, `0o100755` or `0o120000`).
    pub mode: u32,
    /// Size of the blob in bytes.
    pub size: u64,
}

impl FileEntry {
    /// Returns true if the entry is a symbolic link.
    #[must_use]
    pub const fn is_symlink(&self) -> bool {
        self.mode == MODE_SYMLINK
    }

    /// Returns the permission bits recorded for the entry.
    ///
    /// Git only tracks the executable bit, so this is one of `0o755`,
    /// `0o644` or, for symbolic links, `0o777`.
    #[must_use]
    pub const fn permissions(&self) -> u32 {
        match self.mode {
            MODE_EXECUTABLE => 0o755,
            MODE_SYMLINK => 0o777,
            _ => 0o644,
        }
    }
}

/// The tree of the commit a tag resolves to.
pub struct ResolvedTree<'r> {
    repo: &'r Repository,
    tag: String,
    commit: Oid,
    tree: git2::Tree<'r>,
    odb: git2::Odb<'r>,
}

impl fmt::Debug for ResolvedTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedTree")
            .field("tag", &self.tag)
            .field("commit", &self.commit)
            .finish_non_exhaustive()
    }
}

impl<'r> ResolvedTree<'r> {
    /// Returns the tag this tree was resolved from.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the id of the commit the tag resolved to.
    #[must_use]
    pub fn commit_id(&self) -> String {
        self.commit.to_string()
    }

    /// Iterates over every file leaf of the tree.
    ///
    /// The sequence is lazy and finite; call `files` again to restart it.
    /// Directories and submodule entries are never yielded.
    #[must_use]
    pub fn files(&self) -> Files<'_, 'r> {
        Files {
            repo: self.repo,
            odb: &self.odb,
            stack: vec![Frame {
                prefix: String::new(),
                tree: self.tree.clone(),
                index: 0,
            }],
        }
    }

    /// Reads the contents of a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TreeRead`] if the blob cannot be loaded.
    pub fn read(&self, entry: &FileEntry) -> Result<Vec<u8>> {
        self.with_contents(entry, <[u8]>::to_vec)
    }

    /// Calls `f` with the contents of a file without copying them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TreeRead`] if the blob cannot be loaded.
    pub fn with_contents<T>(&self, entry: &FileEntry, f: impl FnOnce(&[u8]) -> T) -> Result<T> {
        let blob = self
            .repo
            .find_blob(entry.oid)
            .map_err(|e| Error::tree_read(entry.path.as_str(), &e))?;
        Ok(f(blob.content()))
    }
}

struct Frame<'r> {
    prefix: String,
    tree: git2::Tree<'r>,
    index: usize,
}

/// Lazy depth-first iterator over the file leaves of a [`ResolvedTree`].
pub struct Files<'t, 'r> {
    repo: &'r Repository,
    odb: &'t git2::Odb<'r>,
    stack: Vec<Frame<'r>>,
}

impl fmt::Debug for Files<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Files")
            .field("depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}

impl Iterator for Files<'_, '_> {
    type Item = Result<FileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let next = top.tree.get(top.index).map(|entry| {
                (
                    entry.name().map(str::to_owned),
                    entry.id(),
                    entry.kind(),
                    entry.filemode(),
                )
            });
            let Some((name, oid, kind, mode)) = next else {
                self.stack.pop();
                continue;
            };
            top.index += 1;

            let Some(name) = name else {
                return Some(Err(Error::TreeRead {
                    path: top.prefix.clone(),
                    message: "entry name is not valid UTF-8".to_string(),
                }));
            };
            let path = if top.prefix.is_empty() {
                name
            } else {
                format!("{}/{name}", top.prefix)
            };

            match kind {
                Some(ObjectType::Tree) => match self.repo.find_tree(oid) {
                    Ok(tree) => self.stack.push(Frame {
                        prefix: path,
                        tree,
                        index: 0,
                    }),
                    Err(e) => return Some(Err(Error::tree_read(path, &e))),
                },
                Some(ObjectType::Blob) => {
                    return Some(match self.odb.read_header(oid) {
                        Ok((size, _)) => Ok(FileEntry {
                            path,
                            oid,
                            mode: u32::try_from(mode).unwrap_or_default(),
                            size: size as u64,
                        }),
                        Err(e) => Err(Error::tree_read(path, &e)),
                    });
                }
                // Gitlinks point at commits of other repositories.
                _ => {}
            }
        }
    }
}
