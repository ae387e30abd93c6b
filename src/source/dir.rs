//! Directory source: every regular file below a directory, decoded with one
//! format and merged into a single tree.
//!
//! Entries are visited sorted by file name, depth first, so files later in
//! that order win on colliding keys. Sub-directories are only entered when
//! the source is recursive.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use crate::decoder::DecoderFactory;
use crate::error::{ConfigError, Result};
use crate::partial::Partial;
use crate::types::kind;
use crate::value::Value;

use super::factory::{Args, Description, SourceContext, SourceStrategy};
use super::file::load_file;
use super::{Source, SourceTree};

pub struct DirSource {
    path: PathBuf,
    tree: SourceTree,
}

impl DirSource {
    pub fn new(
        path: impl Into<PathBuf>,
        format: &str,
        recursive: bool,
        decoders: &DecoderFactory,
        separator: &str,
    ) -> Result<Self> {
        let path = path.into();
        let partial = load_dir(&path, format, recursive, decoders)?;
        Ok(Self {
            tree: SourceTree::new(partial, separator),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for DirSource {
    fn tree(&self) -> &SourceTree {
        &self.tree
    }
}

fn load_dir(
    root: &Path,
    format: &str,
    recursive: bool,
    decoders: &DecoderFactory,
) -> Result<Partial> {
    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut merged = Partial::new();
    let mut count = 0usize;
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            ConfigError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        merged.merge(load_file(entry.path(), format, decoders)?);
        count += 1;
    }

    debug!(path = %root.display(), files = count, recursive, "loaded directory");
    Ok(merged)
}

/// `dir`: positional `[path, format?, recursive?]`; description fields
/// `path`, `format`, `recursive` (default `false`).
pub struct DirStrategy {
    context: Arc<SourceContext>,
}

impl DirStrategy {
    pub fn new(context: Arc<SourceContext>) -> Self {
        Self { context }
    }

    fn build(&self, path: String, format: String, recursive: bool) -> Result<Arc<dyn Source>> {
        let source = DirSource::new(
            path,
            &format,
            recursive,
            &self.context.decoders,
            &self.context.separator,
        )?;
        Ok(Arc::new(source))
    }
}

impl SourceStrategy for DirStrategy {
    fn accepts(&self, name: &str) -> bool {
        name == kind::DIR
    }

    fn create(&self, args: &[Value]) -> Result<Arc<dyn Source>> {
        let args = Args::new(kind::DIR, args);
        self.build(
            args.string(0, "path")?,
            args.string_or(1, "format", &self.context.file_format)?,
            args.bool_or(2, "recursive", false)?,
        )
    }

    fn create_from_config(&self, config: &Partial) -> Result<Arc<dyn Source>> {
        let desc = Description::new(kind::DIR, config);
        self.build(
            desc.string("path")?,
            desc.string_or("format", &self.context.file_format)?,
            desc.bool_or("recursive", false)?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn layout() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yaml"), "db:\n  host: a\n  port: 1\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "db:\n  port: 2\nname: svc\n").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.yaml"), "deep: true\n").unwrap();
        dir
    }

    #[test]
    fn non_recursive_skips_subdirectories() {
        let dir = layout();
        let decoders = DecoderFactory::with_defaults();
        let source = DirSource::new(dir.path(), "yaml", false, &decoders, ".").unwrap();
        assert!(source.has("name"));
        assert!(!source.has("deep"));
    }

    #[test]
    fn recursive_descends() {
        let dir = layout();
        let decoders = DecoderFactory::with_defaults();
        let source = DirSource::new(dir.path(), "yaml", true, &decoders, ".").unwrap();
        assert_eq!(source.get("deep").unwrap(), Value::Bool(true));
    }

    #[test]
    fn files_merge_in_name_order() {
        let dir = layout();
        let decoders = DecoderFactory::with_defaults();
        let source = DirSource::new(dir.path(), "yaml", false, &decoders, ".").unwrap();
        assert_eq!(source.get("db.host").unwrap(), Value::from("a"));
        assert_eq!(source.get("db.port").unwrap(), Value::Int(2));
    }

    #[test]
    fn empty_directory_is_empty_tree() {
        let dir = TempDir::new().unwrap();
        let decoders = DecoderFactory::with_defaults();
        let source = DirSource::new(dir.path(), "yaml", true, &decoders, ".").unwrap();
        assert!(source.partial().is_empty());
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let decoders = DecoderFactory::with_defaults();
        let result = DirSource::new(dir.path().join("gone"), "yaml", false, &decoders, ".");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn undecodable_file_aborts_load() {
        let dir = layout();
        fs::write(dir.path().join("z.yaml"), "key: [unclosed\n").unwrap();
        let decoders = DecoderFactory::with_defaults();
        let result = DirSource::new(dir.path(), "yaml", false, &decoders, ".");
        assert!(matches!(result, Err(ConfigError::Decode { .. })));
    }
}
