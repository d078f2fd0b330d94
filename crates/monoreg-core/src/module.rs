//! Partitioning of a tree into modules.
//!
//! A module is a top-level directory of the monorepo. Files at the tree root
//! and files under hidden top-level directories (`.github`, `.vscode`, ...)
//! belong to no module.

use std::collections::BTreeMap;

use crate::store::FileEntry;

/// Splits a repository path into `(module, rest)`.
///
/// Returns `None` unless the path is `M/<rest>` where both parts are
/// non-empty and `M` does not start with `.`.
///
/// # Examples
///
/// ```
/// use monoreg_core::module_of;
///
/// assert_eq!(module_of("docker/main.tf"), Some(("docker", "main.tf")));
/// assert_eq!(module_of("docker/files/run.sh"), Some(("docker", "files/run.sh")));
/// assert_eq!(module_of("README.md"), None);
/// assert_eq!(module_of(".github/workflows/ci.yml"), None);
/// ```
#[must_use]
pub fn module_of(path: &str) -> Option<(&str, &str)> {
    let (module, rest) = path.split_once('/')?;
    if module.is_empty() || rest.is_empty() || module.starts_with('.') {
        return None;
    }
    Some((module, rest))
}

/// Groups file entries by the module they belong to.
///
/// Entries outside any module are dropped. Each module's entries are sorted
/// by path with byte-wise lexicographic comparison of the UTF-8 path
/// (`str::cmp`), so the order never depends on how the tree was walked.
#[must_use]
pub fn partition_by_module<I>(files: I) -> BTreeMap<String, Vec<FileEntry>>
where
    I: IntoIterator<Item = FileEntry>,
{
    let mut modules: BTreeMap<String, Vec<FileEntry>> = BTreeMap::new();

    for entry in files {
        let Some((module, _)) = module_of(&entry.path) else {
            continue;
        };
        match modules.get_mut(module) {
            Some(entries) => entries.push(entry),
            None => {
                modules.insert(module.to_string(), vec![entry]);
            }
        }
    }

    for entries in modules.values_mut() {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
    }

    modules
}

/// Returns the entries of a single module, sorted as in [`partition_by_module`].
#[must_use]
pub fn module_files<I>(files: I, module: &str) -> Vec<FileEntry>
where
    I: IntoIterator<Item = FileEntry>,
{
    let mut entries: Vec<FileEntry> = files
        .into_iter()
        .filter(|entry| module_of(&entry.path).is_some_and(|(m, _)| m == module))
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}
