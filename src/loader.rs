//! Loader abstraction: file discovery, format dispatch, and lazy loading.
//!
//! The [`Loader`] trait turns a set of file paths into a lazy sequence of
//! [`RawDoc`]s. [`FileLoader`] is the production adapter: it keys a closed
//! set of extraction backends by normalized file extension and maps each
//! backend unit into one `RawDoc`. Missing files, unsupported extensions,
//! and per-file backend failures are all non-fatal: they are logged and the
//! file is skipped, so a single bad file never aborts a batch.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{IngestError, Result};
use crate::extract::{self, ExtractError, ExtractedUnit, TextConfig};
use crate::models::RawDoc;

/// Metadata key the loader always sets on every yielded document.
pub const META_SOURCE_PATH: &str = "source_path";

/// Normalized extension (lower-case, leading dot) for a path, if it has one.
pub fn normalized_ext(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}

/// Call-time overrides for the per-extension configuration table. Only
/// text-like formats consult these; binary backends ignore them.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub encoding: Option<String>,
    pub autodetect_encoding: Option<bool>,
}

/// Converts file paths into a lazy sequence of [`RawDoc`]s.
///
/// Implementations declare which extensions they accept; discovery and
/// parser classification have default implementations driven by that set.
pub trait Loader {
    /// Normalized extensions (lower-case, leading dot) this loader accepts.
    fn allowed_extensions(&self) -> &[&str] {
        &[".txt"]
    }

    /// Loads the given files, yielding one `RawDoc` per backend unit.
    ///
    /// The returned sequence is pull-based and single-pass: each element
    /// materializes only as consumed, so memory is bounded by one file's
    /// content at a time. Consumers that need the count must collect once.
    /// Never fails for missing files, unsupported extensions, or backend
    /// errors; those are logged and skipped.
    fn load<'a>(
        &'a self,
        paths: Vec<PathBuf>,
        options: Option<LoadOptions>,
    ) -> Box<dyn Iterator<Item = RawDoc> + 'a>;

    /// Recursively collects all allowed files under `root`.
    ///
    /// A file root is returned iff its extension is allowed; a missing root
    /// yields an empty list. Output is sorted lexicographically and
    /// de-duplicated so repeated runs over an unchanged tree are identical.
    fn discover_files(&self, root: &Path) -> Vec<PathBuf> {
        if root.is_file() {
            return if self.accepts(root) {
                vec![root.to_path_buf()]
            } else {
                Vec::new()
            };
        }
        if !root.is_dir() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.accepts(p))
            .collect();
        files.sort();
        files.dedup();
        files
    }

    /// Stable parser-identifier string recorded for provenance.
    fn get_parser_name(&self, _path: &Path) -> &'static str {
        "unknown"
    }

    /// Whether this loader accepts the path's normalized extension.
    fn accepts(&self, path: &Path) -> bool {
        normalized_ext(path)
            .map(|ext| self.allowed_extensions().contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

/// Extraction backend selected for an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Pdf,
    Docx,
    Text,
    Markdown,
}

/// Production loader for the knowledge-base pipeline: PDF, DOCX, plain text,
/// and Markdown, each delegated to the matching backend in
/// [`crate::extract`].
pub struct FileLoader {
    text_config: TextConfig,
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new(TextConfig::default())
    }
}

impl FileLoader {
    pub fn new(text_config: TextConfig) -> Self {
        Self { text_config }
    }

    fn backend_for(ext: &str) -> Option<Backend> {
        match ext {
            ".pdf" => Some(Backend::Pdf),
            ".docx" => Some(Backend::Docx),
            ".txt" => Some(Backend::Text),
            ".md" => Some(Backend::Markdown),
            _ => None,
        }
    }

    /// Merges call-time overrides onto the loader's base text configuration.
    /// Text-like formats consult the result; binary backends ignore it.
    fn resolved_text_config(&self, options: Option<&LoadOptions>) -> TextConfig {
        match options {
            Some(opts) => TextConfig {
                encoding: opts
                    .encoding
                    .clone()
                    .unwrap_or_else(|| self.text_config.encoding.clone()),
                autodetect_encoding: opts
                    .autodetect_encoding
                    .unwrap_or(self.text_config.autodetect_encoding),
            },
            None => self.text_config.clone(),
        }
    }

    fn run_backend(
        &self,
        backend: Backend,
        path: &Path,
        config: &TextConfig,
    ) -> std::result::Result<Vec<ExtractedUnit>, ExtractError> {
        match backend {
            Backend::Pdf => extract::extract_pdf(path),
            Backend::Docx => extract::extract_docx(path),
            Backend::Text | Backend::Markdown => extract::extract_text_file(path, config),
        }
    }

    /// Loads one file into `RawDoc`s, or `None` when the file is skipped
    /// (missing, unsupported, backend failure, or nothing usable in it).
    /// `resolved` memoizes the per-extension configuration for the duration
    /// of one load pass.
    fn load_one(
        &self,
        path: &Path,
        options: Option<&LoadOptions>,
        resolved: &mut HashMap<String, TextConfig>,
    ) -> Option<Vec<RawDoc>> {
        if !path.exists() {
            warn!(path = %path.display(), "file not found, skipping");
            return None;
        }
        let ext = normalized_ext(path)?;
        let backend = match Self::backend_for(&ext) {
            Some(b) => b,
            None => {
                warn!(path = %path.display(), ext = %ext, "no loader backend for extension, skipping");
                return None;
            }
        };
        let config = resolved
            .entry(ext.clone())
            .or_insert_with(|| self.resolved_text_config(options))
            .clone();
        let units = match self.run_backend(backend, path, &config) {
            Ok(units) => units,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "backend failed, skipping file");
                return None;
            }
        };
        let docs: Vec<RawDoc> = units
            .into_iter()
            .filter(|unit| {
                if unit.content.trim().is_empty() {
                    debug!(path = %path.display(), "skipping empty unit");
                    false
                } else {
                    true
                }
            })
            .map(|unit| {
                let mut metadata = unit.metadata;
                metadata.insert(
                    META_SOURCE_PATH.to_string(),
                    Value::from(path.display().to_string()),
                );
                RawDoc {
                    text: unit.content,
                    metadata,
                }
            })
            .collect();
        if docs.is_empty() {
            warn!(path = %path.display(), "no usable documents in file");
            return None;
        }
        debug!(path = %path.display(), count = docs.len(), "loaded file");
        Some(docs)
    }
}

impl Loader for FileLoader {
    fn allowed_extensions(&self) -> &[&str] {
        &[".pdf", ".docx", ".txt", ".md"]
    }

    fn load<'a>(
        &'a self,
        paths: Vec<PathBuf>,
        options: Option<LoadOptions>,
    ) -> Box<dyn Iterator<Item = RawDoc> + 'a> {
        info!(count = paths.len(), "loading files");
        Box::new(LoadedDocs {
            loader: self,
            pending: paths.into(),
            current: Vec::new().into_iter(),
            options,
            resolved: HashMap::new(),
        })
    }

    fn get_parser_name(&self, path: &Path) -> &'static str {
        match normalized_ext(path).as_deref() {
            Some(".pdf") => "pdf_parser",
            Some(".docx") => "docx_parser",
            Some(".txt") => "txt_parser",
            Some(".md") => "markdown_parser",
            _ => "unknown",
        }
    }
}

/// Lazy, single-pass sequence of loaded documents. At most one file's
/// documents are held in memory at a time.
struct LoadedDocs<'a> {
    loader: &'a FileLoader,
    pending: VecDeque<PathBuf>,
    current: std::vec::IntoIter<RawDoc>,
    options: Option<LoadOptions>,
    // ext -> resolved text config, scoped to this pass
    resolved: HashMap<String, TextConfig>,
}

impl Iterator for LoadedDocs<'_> {
    type Item = RawDoc;

    fn next(&mut self) -> Option<RawDoc> {
        loop {
            if let Some(doc) = self.current.next() {
                return Some(doc);
            }
            let path = self.pending.pop_front()?;
            if let Some(docs) = self.loader.load_one(&path, self.options.as_ref(), &mut self.resolved) {
                self.current = docs.into_iter();
            }
        }
    }
}

/// Input accepted by [`FileLoader::run`]: a single path (file or directory)
/// or an explicit list of paths.
#[derive(Debug, Clone)]
pub enum RunInput {
    Path(PathBuf),
    Paths(Vec<PathBuf>),
}

impl From<PathBuf> for RunInput {
    fn from(path: PathBuf) -> Self {
        RunInput::Path(path)
    }
}

impl From<&Path> for RunInput {
    fn from(path: &Path) -> Self {
        RunInput::Path(path.to_path_buf())
    }
}

impl From<Vec<PathBuf>> for RunInput {
    fn from(paths: Vec<PathBuf>) -> Self {
        RunInput::Paths(paths)
    }
}

/// What a [`FileLoader::run`] call produced.
pub enum RunOutput<'a> {
    /// Lazy document sequence (no output directory was given).
    Docs(Box<dyn Iterator<Item = RawDoc> + 'a>),
    /// Paths of the serialized documents written to the output directory.
    Written(Vec<PathBuf>),
}

/// Outcome of a [`FileLoader::run`] call, including the inputs that were
/// set aside as skipped (not failed).
pub struct RunReport<'a> {
    pub output: RunOutput<'a>,
    pub skipped: Vec<PathBuf>,
}

impl FileLoader {
    /// Convenience composition: normalize the input (expanding directories
    /// via discovery, recording non-existent or unsupported paths as
    /// skipped), then load. With an output directory, each `RawDoc` is
    /// persisted as one JSON file (written to a temp sibling, then renamed)
    /// and the written paths are returned instead of the lazy sequence.
    pub fn run<'a>(
        &'a self,
        input: impl Into<RunInput>,
        output_dir: Option<&Path>,
        options: Option<LoadOptions>,
    ) -> Result<RunReport<'a>> {
        let raw_paths = match input.into() {
            RunInput::Path(p) => vec![p],
            RunInput::Paths(ps) => ps,
        };

        let mut accepted = Vec::new();
        let mut skipped = Vec::new();
        for path in raw_paths {
            if path.is_dir() {
                accepted.extend(self.discover_files(&path));
            } else if path.is_file() && self.accepts(&path) {
                accepted.push(path);
            } else {
                warn!(path = %path.display(), "skipping missing or unsupported input");
                skipped.push(path);
            }
        }

        let docs = self.load(accepted, options);
        let output = match output_dir {
            None => RunOutput::Docs(docs),
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let mut written = Vec::new();
                for (seq, doc) in docs.enumerate() {
                    written.push(write_doc_atomic(dir, seq, &doc)?);
                }
                RunOutput::Written(written)
            }
        };

        Ok(RunReport { output, skipped })
    }
}

/// Writes one serialized `RawDoc` to `dir`, atomically via temp-then-rename.
fn write_doc_atomic(dir: &Path, seq: usize, doc: &RawDoc) -> Result<PathBuf> {
    let stem = doc
        .metadata
        .get(META_SOURCE_PATH)
        .and_then(Value::as_str)
        .and_then(|s| Path::new(s).file_stem().map(|f| f.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "doc".to_string());
    let final_path = dir.join(format!("{}_{:04}.json", stem, seq));
    let tmp_path = final_path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(doc)
        .map_err(|e| IngestError::InvalidInput(format!("failed to serialize document: {}", e)))?;
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, &final_path)?;
    Ok(final_path)
}
