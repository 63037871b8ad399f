use std::collections::HashSet;
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Candidate directories for a package called `name`.
///
/// The default linker path (empty) comes first. Then, under `$HOME`,
/// `/usr/local` and `/opt`: the root's `lib`, the package directory in its
/// spelled, upper- and lower-case forms (and their `lib`), and every entry
/// whose name starts with the package name (e.g. `/opt/arpack-ng-3.3.0`).
/// Only directories that exist are returned.
#[tracing::instrument(skip(runtime))]
pub fn guess_dirs<R: Runtime>(runtime: &R, name: &str) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = runtime.home_dir() {
        roots.push(home);
    }
    roots.push(PathBuf::from("/usr/local"));
    roots.push(PathBuf::from("/opt"));

    let spellings = [name.to_string(), name.to_uppercase(), name.to_lowercase()];
    let mut candidates = Vec::new();

    for root in &roots {
        candidates.push(root.join("lib"));
        let entries = runtime.read_dir(root).unwrap_or_default();

        for spelling in &spellings {
            candidates.push(root.join(spelling));
            candidates.push(root.join(spelling).join("lib"));

            let prefix = spelling.to_uppercase();
            for entry in &entries {
                let matches = entry
                    .file_name()
                    .map(|n| n.to_string_lossy().to_uppercase().starts_with(&prefix))
                    .unwrap_or(false);
                if matches {
                    candidates.push(entry.clone());
                    candidates.push(entry.join("lib"));
                }
            }
        }
    }

    let mut seen = HashSet::new();
    let mut dirs = vec![PathBuf::new()];
    for candidate in candidates {
        if seen.insert(candidate.clone()) && runtime.is_dir(&candidate) {
            dirs.push(candidate);
        }
    }
    dirs
}
