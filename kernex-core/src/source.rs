//! Kernel source assembly and the specialization hook.
//!
//! Compilation takes a list of source fragments: literal text, or files
//! whose parent directories become include-search paths for the
//! specializer. The assembled text may be run through a backend-specific
//! [`Specializer`] before it reaches the compiler, and may be persisted
//! verbatim for inspection.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// One kernel source fragment.
#[derive(Debug, Clone)]
pub enum Source {
    /// Literal source text.
    Text(String),
    /// A source file; its directory joins the include-search path.
    Path(PathBuf),
}

impl Source {
    pub fn text(text: impl Into<String>) -> Self {
        Source::Text(text.into())
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Source::Path(path.into())
    }
}

/// Backend-specific source rewriting, applied between assembly and
/// compilation. The assembled text goes in; whatever comes out is compiled
/// unmodified.
pub trait Specializer {
    fn specialize(&self, source: &str, target: &str, include_dirs: &[PathBuf]) -> Result<String>;
}

/// Specializer that returns the source unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Specializer for Passthrough {
    fn specialize(&self, source: &str, _target: &str, _include_dirs: &[PathBuf]) -> Result<String> {
        Ok(source.to_owned())
    }
}

/// Options for one `add_kernels` call.
#[derive(Default)]
pub struct BuildOptions<'a> {
    /// Specialization step to run on the assembled source, if any.
    pub specializer: Option<&'a dyn Specializer>,
    /// Writes the fully specialized source to this path, verbatim.
    /// Side effect only; nothing reads the file afterwards.
    pub save_source_as: Option<PathBuf>,
}

impl<'a> BuildOptions<'a> {
    pub fn specializer(mut self, specializer: &'a dyn Specializer) -> Self {
        self.specializer = Some(specializer);
        self
    }

    pub fn save_source_as(mut self, path: impl AsRef<Path>) -> Self {
        self.save_source_as = Some(path.as_ref().to_path_buf());
        self
    }
}

/// Concatenates the fragments and collects include-search directories from
/// file fragments, in order, deduplicated.
pub fn assemble(sources: &[Source]) -> Result<(String, Vec<PathBuf>)> {
    let mut parts = Vec::with_capacity(sources.len());
    let mut dirs: Vec<PathBuf> = Vec::new();
    for source in sources {
        match source {
            Source::Text(text) => parts.push(text.clone()),
            Source::Path(path) => {
                parts.push(fs::read_to_string(path)?);
                if let Some(dir) = path.parent() {
                    if !dirs.iter().any(|d| d == dir) {
                        dirs.push(dir.to_path_buf());
                    }
                }
            }
        }
    }
    Ok((parts.join("\n"), dirs))
}

/// Assembles, specializes and optionally persists the source for one
/// compilation, returning the text handed to the backend compiler.
pub fn prepare(sources: &[Source], target: &str, options: &BuildOptions) -> Result<String> {
    let (mut source, include_dirs) = assemble(sources)?;
    if let Some(specializer) = options.specializer {
        source = specializer.specialize(&source, target, &include_dirs)?;
    }
    if let Some(path) = &options.save_source_as {
        fs::write(path, &source)?;
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn assembles_in_order() {
        let sources = [Source::text("alpha"), Source::text("beta")];
        let (text, dirs) = assemble(&sources).unwrap();
        assert_eq!(text, "alpha\nbeta");
        assert!(dirs.is_empty());
    }

    #[test]
    fn file_fragments_contribute_include_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helpers.wgsl");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "fn helper() {{}}").unwrap();

        let sources = [Source::path(&path), Source::text("fn body() {}")];
        let (text, dirs) = assemble(&sources).unwrap();
        assert!(text.starts_with("fn helper()"));
        assert!(text.ends_with("fn body() {}"));
        assert_eq!(dirs, vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let sources = [Source::path("/nonexistent/kernels.wgsl")];
        assert!(assemble(&sources).is_err());
    }

    #[test]
    fn prepare_persists_specialized_source() {
        struct Upper;
        impl Specializer for Upper {
            fn specialize(&self, source: &str, target: &str, _dirs: &[PathBuf]) -> Result<String> {
                Ok(format!("// target: {target}\n{}", source.to_uppercase()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let saved = dir.path().join("out.wgsl");
        let options = BuildOptions::default()
            .specializer(&Upper)
            .save_source_as(&saved);
        let text = prepare(&[Source::text("fn body() {}")], "wgsl", &options).unwrap();
        assert!(text.contains("FN BODY"));
        assert_eq!(fs::read_to_string(&saved).unwrap(), text);
    }
}
