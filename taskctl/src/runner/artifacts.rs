//! Artifact harvesting: after a run completes, the staging directory
//! (the host side of the container's `/app` mount) is walked for files
//! worth keeping, skipping the toolchain's own build litter.

use std::path::Path;

use walkdir::WalkDir;

/// Directory names never descended into - build caches, VCS metadata,
/// and dependency trees a sandboxed run might create or touch.
const PRUNED_DIRS: &[&str] = &[".git", "venv", "__pycache__", "node_modules", "target", ".cargo"];

/// Extensions worth surfacing as artifacts. Anything else (compiled
/// binaries, `.pyc`, the staged source file itself) is left behind.
const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "json", "csv", "md", "png", "jpg", "jpeg", "svg", "pdf", "html", "yaml", "yml", "log",
];

#[derive(Debug, Clone)]
pub struct Artifact {
    pub relative_path: String,
    pub contents: Vec<u8>,
}

/// Walks the whole staging tree for files worth keeping. This also
/// covers the conventional `data/` and `output_files/` subdirectories a
/// generated program is told to write its output to - they're
/// just ordinary subdirectories of the walk, not pruned.
pub fn harvest(staging_dir: &Path) -> std::io::Result<Vec<Artifact>> {
    let mut found = Vec::new();
    harvest_dir(staging_dir, staging_dir, &mut found)?;
    Ok(found)
}

fn harvest_dir(root: &Path, dir: &Path, found: &mut Vec<Artifact>) -> std::io::Result<()> {
    let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
        if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy();
            return !PRUNED_DIRS.contains(&name.as_ref());
        }
        true
    });

    for entry in walker {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension) {
            continue;
        }
        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let contents = std::fs::read(path)?;
        found.push(Artifact { relative_path, contents });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn harvests_allowed_extensions_and_skips_pruned_dirs() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("result.csv"), "a,b\n1,2\n").unwrap();
        std::fs::write(dir.path().join("main.py"), "print(1)").unwrap();
        std::fs::create_dir(dir.path().join("__pycache__")).unwrap();
        std::fs::write(dir.path().join("__pycache__").join("main.cpython-312.pyc"), b"junk").unwrap();

        let found = harvest(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].relative_path, "result.csv");
    }

    #[test]
    fn harvests_conventional_output_subdirs() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("output_files")).unwrap();
        std::fs::write(dir.path().join("output_files").join("report.md"), "# done").unwrap();

        let found = harvest(dir.path()).unwrap();
        assert!(found.iter().any(|a| a.relative_path.contains("report.md")));
    }
}
