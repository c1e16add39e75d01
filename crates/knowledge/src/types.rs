//! Index builder type definitions.

use llamaserve_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Chunk size used when none (or zero) is requested.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// The only glob patterns accepted by the `file_directory` loader.
pub const ALLOWED_GLOBS: [&str; 2] = ["**/*.txt", "**/*.md"];

/// Source format of the documents to index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadType {
    Csv,
    FileDirectory,
    Pdf,
    Html,
    Json,
    Text,
}

impl LoadType {
    pub const ALL: [LoadType; 6] = [
        LoadType::Csv,
        LoadType::FileDirectory,
        LoadType::Pdf,
        LoadType::Html,
        LoadType::Json,
        LoadType::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::FileDirectory => "file_directory",
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                AppError::InvalidArgument(format!(
                    "Invalid load type '{}'. Allowed load types: csv, file_directory, pdf, html, json, text",
                    s
                ))
            })
    }
}

/// Check a `file_directory` glob against the whitelist.
pub fn validate_file_glob(glob: Option<&str>) -> AppResult<&str> {
    match glob {
        Some(g) if ALLOWED_GLOBS.contains(&g) => Ok(g),
        Some(g) => Err(AppError::InvalidArgument(format!(
            "File glob '{}' is not allowed; only **/*.txt and **/*.md are supported",
            g
        ))),
        None => Err(AppError::InvalidArgument(
            "load type file_directory requires a file glob (**/*.txt or **/*.md)".to_string(),
        )),
    }
}

/// Normalise a requested chunk size: absent or zero means the default.
pub fn resolve_chunk_size(requested: Option<usize>) -> usize {
    match requested {
        None | Some(0) => DEFAULT_CHUNK_SIZE,
        Some(size) => size,
    }
}

/// Everything the index builder needs for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexBuilderConfig {
    /// File or directory to load
    pub source_path: PathBuf,

    /// Source format
    pub load_type: LoadType,

    /// Glob for `file_directory` loads
    pub file_glob: Option<String>,

    /// Embedding model identifier
    pub model_name: String,

    /// Provider-specific embedding options
    pub model_kwargs: Map<String, Value>,

    /// Chunk size in characters, always positive
    pub chunk_size: usize,

    /// Directory the index is written to
    pub output_dir: PathBuf,
}

/// On-disk shape of an index build file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexBuildFile {
    source_path: PathBuf,
    load_type: String,
    #[serde(default)]
    file_glob: Option<String>,
    model_name: String,
    #[serde(default)]
    model_kwargs: Map<String, Value>,
    #[serde(default)]
    chunk_size: Option<usize>,
    output_dir: PathBuf,
}

impl IndexBuilderConfig {
    pub fn new(
        source_path: impl Into<PathBuf>,
        load_type: LoadType,
        model_name: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            load_type,
            file_glob: None,
            model_name: model_name.into(),
            model_kwargs: Map::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            output_dir: output_dir.into(),
        }
    }

    pub fn with_file_glob(mut self, glob: impl Into<String>) -> Self {
        self.file_glob = Some(glob.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: Option<usize>) -> Self {
        self.chunk_size = resolve_chunk_size(chunk_size);
        self
    }

    pub fn with_model_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.model_kwargs = kwargs;
        self
    }

    /// Load a build description from YAML.
    ///
    /// Relative `sourcePath` and `outputDir` values are resolved against the
    /// directory containing the file.
    pub fn from_yaml_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read index config {:?}: {}", path, e))
        })?;
        let file: IndexBuildFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse index config {:?}: {}", path, e))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        let mut config = Self::new(
            resolve(file.source_path),
            file.load_type.parse()?,
            file.model_name,
            resolve(file.output_dir),
        )
        .with_chunk_size(file.chunk_size)
        .with_model_kwargs(file.model_kwargs);
        config.file_glob = file.file_glob;

        Ok(config)
    }
}

/// A loaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,

    /// Always carries `source`; loaders add `row`, `page`, `title` or `seq_num`
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>, source: &Path) -> Self {
        let mut metadata = Map::new();
        metadata.insert(
            "source".to_string(),
            Value::String(source.to_string_lossy().to_string()),
        );
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// A bounded fragment of a document, before embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Index of the document in the loaded collection
    pub document_index: usize,

    /// Position within the document
    pub position: u32,

    pub text: String,

    /// Copy of the document's metadata plus `start_index`
    pub metadata: Map<String, Value>,
}

/// A chunk as persisted in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,

    /// Position in the index
    pub position: u32,

    pub text: String,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Statistics from an index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of source documents
    pub documents: usize,

    /// Number of chunks stored
    pub chunks: usize,

    /// Embedding dimension
    pub dimensions: usize,

    /// Where the index was written
    pub output_dir: PathBuf,

    /// Duration in seconds
    pub duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_type_parsing() {
        assert_eq!("csv".parse::<LoadType>().unwrap(), LoadType::Csv);
        assert_eq!(
            "file_directory".parse::<LoadType>().unwrap(),
            LoadType::FileDirectory
        );
        for load_type in LoadType::ALL {
            assert_eq!(load_type.as_str().parse::<LoadType>().unwrap(), load_type);
        }
    }

    #[test]
    fn test_invalid_load_type() {
        let err = "docx".parse::<LoadType>().unwrap_err();
        assert!(err.is_invalid_argument());

        // Matching is exact
        assert!("CSV".parse::<LoadType>().is_err());
    }

    #[test]
    fn test_validate_file_glob() {
        assert_eq!(validate_file_glob(Some("**/*.md")).unwrap(), "**/*.md");
        assert!(validate_file_glob(Some("**/*.pdf"))
            .unwrap_err()
            .is_invalid_argument());
        assert!(validate_file_glob(None).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_chunk_size_defaults() {
        assert_eq!(resolve_chunk_size(None), 1000);
        assert_eq!(resolve_chunk_size(Some(0)), 1000);
        assert_eq!(resolve_chunk_size(Some(250)), 250);
    }

    #[test]
    fn test_document_source_metadata() {
        let doc = Document::new("hello", Path::new("docs/a.txt")).with_metadata("row", 3);
        assert_eq!(doc.source(), Some("docs/a.txt"));
        assert_eq!(doc.metadata["row"], 3);
    }

    #[test]
    fn test_config_from_yaml_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.yaml");
        std::fs::write(
            &path,
            r#"
sourcePath: docs
loadType: file_directory
fileGlob: "**/*.md"
modelName: trigram
modelKwargs:
  dimensions: 128
chunkSize: 0
outputDir: out
"#,
        )
        .unwrap();

        let config = IndexBuilderConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.load_type, LoadType::FileDirectory);
        assert_eq!(config.file_glob.as_deref(), Some("**/*.md"));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.source_path, temp.path().join("docs"));
        assert_eq!(config.model_kwargs["dimensions"], 128);
    }

    #[test]
    fn test_config_from_yaml_rejects_load_type() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.yaml");
        std::fs::write(
            &path,
            "sourcePath: a\nloadType: xml\nmodelName: trigram\noutputDir: out\n",
        )
        .unwrap();

        let err = IndexBuilderConfig::from_yaml_file(&path).unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
