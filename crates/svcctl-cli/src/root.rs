use std::path::{Path, PathBuf};
use svcctl_core::paths::DESCRIPTOR_FILE;

/// Resolve the project root directory.
///
/// Priority:
/// 1. `--root` flag / `SVCCTL_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `svcctl.yaml`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, |dir| dir.join(DESCRIPTOR_FILE).is_file())
        .or_else(|| find_upward(&cwd, |dir| dir.join(".git").is_dir()))
        .unwrap_or(cwd)
}

/// First directory from `start` upward for which `found` holds.
fn find_upward(start: &Path, found: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start.ancestors().find(|dir| found(dir)).map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn descriptor_found_from_nested_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DESCRIPTOR_FILE), "project: p\n").unwrap();
        let subdir = dir.path().join("src/deep");
        std::fs::create_dir_all(&subdir).unwrap();

        let found = find_upward(&subdir, |d| d.join(DESCRIPTOR_FILE).is_file());
        assert_eq!(found.as_deref(), Some(dir.path()));
    }

    #[test]
    fn nearest_match_wins() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("svc");
        std::fs::create_dir_all(inner.join(".git")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();

        let found = find_upward(&inner, |d| d.join(".git").is_dir());
        assert_eq!(found, Some(inner));
    }
}
