//! Throwaway git repositories for tests.
//!
//! Available to this crate's unit tests and, with the `fixtures` feature, to
//! downstream test suites. Every helper panics on failure.

use std::path::Path;

use git2::{IndexEntry, IndexTime, Oid, Repository, Signature, Time};
use tempfile::TempDir;

/// Git file mode of a regular, non-executable file.
pub const MODE_FILE: u32 = 0o100_644;

/// A git repository in a temporary directory, removed on drop.
///
/// Commits are cumulative: each one starts from the files of the previous
/// commit.
///
/// # Examples
///
/// ```rust,ignore
/// use monoreg_core::fixtures::FixtureRepo;
///
/// let repo = FixtureRepo::new();
/// repo.commit(&[("docker/main.tf", "resource x {}")]);
/// repo.tag_lightweight("v1.0.0");
/// ```
pub struct FixtureRepo {
    dir: TempDir,
    repo: Repository,
}

impl std::fmt::Debug for FixtureRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureRepo")
            .field("path", &self.dir.path())
            .finish_non_exhaustive()
    }
}

impl Default for FixtureRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureRepo {
    /// Initializes an empty repository.
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create fixture dir");
        let repo = Repository::init(dir.path()).expect("init fixture repo");
        Self { dir, repo }
    }

    /// Returns the working directory of the repository.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commits text files, returning the new commit id.
    pub fn commit(&self, files: &[(&str, &str)]) -> Oid {
        let entries: Vec<(&str, &[u8], u32)> = files
            .iter()
            .map(|(path, contents)| (*path, contents.as_bytes(), MODE_FILE))
            .collect();
        self.commit_entries(&entries)
    }

    /// Commits files with explicit contents and git modes.
    pub fn commit_entries(&self, files: &[(&str, &[u8], u32)]) -> Oid {
        let mut index = self.repo.index().expect("open index");
        for (path, contents, mode) in files {
            let entry = IndexEntry {
                ctime: IndexTime::new(0, 0),
                mtime: IndexTime::new(0, 0),
                dev: 0,
                ino: 0,
                mode: *mode,
                uid: 0,
                gid: 0,
                file_size: 0,
                id: Oid::zero(),
                flags: 0,
                flags_extended: 0,
                path: path.as_bytes().to_vec(),
            };
            index.add_frombuffer(&entry, contents).expect("stage file");
        }
        self.write_commit(&mut index, &format!("add {} files", files.len()))
    }

    /// Creates a lightweight tag at `HEAD`.
    pub fn tag_lightweight(&self, name: &str) -> Oid {
        let head = self.head();
        self.repo
            .tag_lightweight(name, &head, false)
            .expect("create lightweight tag")
    }

    /// Creates an annotated tag at `HEAD`.
    pub fn tag_annotated(&self, name: &str, message: &str) -> Oid {
        let head = self.head();
        self.repo
            .tag(name, &head, &Self::signature(), message, false)
            .expect("create annotated tag")
    }

    /// Creates a lightweight tag pointing at an arbitrary object id.
    ///
    /// Used to model tags whose target is missing or is not a commit.
    pub fn tag_reference(&self, name: &str, target: Oid) {
        self.repo
            .reference(&format!("refs/tags/{name}"), target, true, "fixture tag")
            .expect("create tag reference");
    }

    /// Writes a blob that no tree references and returns its id.
    pub fn loose_blob(&self, contents: &[u8]) -> Oid {
        self.repo.blob(contents).expect("write blob")
    }

    fn head(&self) -> git2::Object<'_> {
        self.repo
            .head()
            .and_then(|head| head.peel(git2::ObjectType::Commit))
            .expect("HEAD commit")
    }

    fn write_commit(&self, index: &mut git2::Index, message: &str) -> Oid {
        index.write().expect("write index");
        let tree_id = index.write_tree().expect("write tree");
        let tree = self.repo.find_tree(tree_id).expect("find tree");
        let signature = Self::signature();

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .expect("create commit")
    }

    fn signature() -> Signature<'static> {
        Signature::new("monoreg", "monoreg@example.com", &Time::new(1_700_000_000, 0))
            .expect("valid signature")
    }
}
