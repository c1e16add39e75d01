//! Index command handler.
//!
//! Builds document indexes and queries them locally.

use clap::{Args, Subcommand};
use llamaserve_core::{AppConfig, AppError, AppResult};
use llamaserve_knowledge::{IndexBuilder, IndexBuilderConfig, LoadType, VectorStore};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Build and inspect document indexes
#[derive(Args, Debug)]
pub struct IndexCommand {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Load, split, embed and persist a source
    Build(IndexBuildCommand),
    /// Similarity search against a persisted index
    Query(IndexQueryCommand),
    /// Show what a persisted index contains
    Stats(IndexStatsCommand),
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            IndexAction::Build(cmd) => cmd.execute(config).await,
            IndexAction::Query(cmd) => cmd.execute(config).await,
            IndexAction::Stats(cmd) => cmd.execute(config).await,
        }
    }
}

/// Parse `--kwargs` as a JSON object.
fn parse_kwargs(raw: Option<&str>) -> AppResult<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::InvalidArgument(
            "--kwargs must be a JSON object".to_string(),
        )),
        Err(e) => Err(AppError::InvalidArgument(format!(
            "--kwargs is not valid JSON: {}",
            e
        ))),
    }
}

/// Build an index
#[derive(Args, Debug)]
pub struct IndexBuildCommand {
    /// YAML file describing the build; replaces the other build flags
    #[arg(long = "from", conflicts_with_all = ["source", "load_type"])]
    pub from: Option<PathBuf>,

    /// File or directory to load
    #[arg(long, required_unless_present = "from")]
    pub source: Option<PathBuf>,

    /// Source format (csv, file_directory, pdf, html, json, text)
    #[arg(long, required_unless_present = "from")]
    pub load_type: Option<String>,

    /// Glob for file_directory loads (**/*.txt or **/*.md)
    #[arg(long)]
    pub glob: Option<String>,

    /// Embedding model: trigram, ollama:<model>, or a local model directory
    #[arg(long, default_value = "trigram")]
    pub model: String,

    /// Embedding options as a JSON object
    #[arg(long)]
    pub kwargs: Option<String>,

    /// Chunk size in characters (0 or absent means 1000)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Directory the index is written to
    #[arg(long, default_value = "vectordb")]
    pub output: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexBuildCommand {
    fn builder_config(&self, config: &AppConfig) -> AppResult<IndexBuilderConfig> {
        if let Some(from) = &self.from {
            return IndexBuilderConfig::from_yaml_file(&config.resolve_path(from));
        }

        let (Some(source), Some(load_type)) = (&self.source, &self.load_type) else {
            return Err(AppError::InvalidArgument(
                "--source and --load-type are required without --from".to_string(),
            ));
        };
        let load_type: LoadType = load_type.parse()?;

        let mut builder_config = IndexBuilderConfig::new(
            config.resolve_path(source),
            load_type,
            self.model.clone(),
            config.resolve_path(&self.output),
        )
        .with_chunk_size(self.chunk_size)
        .with_model_kwargs(parse_kwargs(self.kwargs.as_deref())?);
        if let Some(glob) = &self.glob {
            builder_config = builder_config.with_file_glob(glob.clone());
        }

        Ok(builder_config)
    }

    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index build command");
        tracing::debug!("Index build options: {:?}", self);

        let builder_config = self.builder_config(config)?;
        let stats = IndexBuilder::new(&builder_config).build().await?;

        if self.json {
            let output = serde_json::json!({
                "documents": stats.documents,
                "chunks": stats.chunks,
                "dimensions": stats.dimensions,
                "outputDir": stats.output_dir,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Indexed {} documents ({} chunks, {} dims) into {} in {:.2}s",
                stats.documents,
                stats.chunks,
                stats.dimensions,
                stats.output_dir.display(),
                stats.duration_secs
            );
        }

        Ok(())
    }
}

/// Query an index
#[derive(Args, Debug)]
pub struct IndexQueryCommand {
    /// Query text
    pub query: String,

    /// Index directory
    #[arg(long, default_value = "vectordb")]
    pub index: PathBuf,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long, default_value = "4")]
    pub top_k: usize,

    /// Embedding model; defaults to the index's own model for trigram indexes
    #[arg(long)]
    pub model: Option<String>,

    /// Embedding options as a JSON object
    #[arg(long)]
    pub kwargs: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexQueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index query command");

        let store = VectorStore::load_local(&config.resolve_path(&self.index))?;
        let meta = store.meta();

        let mut kwargs = parse_kwargs(self.kwargs.as_deref())?;
        let model = match &self.model {
            Some(model) => model.clone(),
            None if meta.provider == "trigram" => {
                kwargs
                    .entry("dimensions")
                    .or_insert_with(|| Value::from(meta.dimensions));
                meta.model.clone()
            }
            None => {
                return Err(AppError::InvalidArgument(format!(
                    "Index was built with {} ({}); pass --model to query it",
                    meta.model, meta.provider
                )))
            }
        };

        let provider = IndexBuilder::create_embedding(&model, &kwargs)?;
        let results = store
            .similarity_search_text(provider.as_ref(), &self.query, self.top_k)
            .await?;
        tracing::debug!("Query returned {} results", results.len());

        if self.json {
            let output: Vec<Value> = results
                .iter()
                .map(|(chunk, score)| {
                    serde_json::json!({
                        "id": chunk.id,
                        "score": score,
                        "text": chunk.text,
                        "metadata": chunk.metadata,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if results.is_empty() {
            println!("No results");
        } else {
            for (rank, (chunk, score)) in results.iter().enumerate() {
                let source = chunk
                    .metadata
                    .get("source")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                println!("{}. [{:.3}] {}", rank + 1, score, source);
                println!("   {}", chunk.text.replace('\n', " "));
            }
        }

        Ok(())
    }
}

/// Show index stats
#[derive(Args, Debug)]
pub struct IndexStatsCommand {
    /// Index directory
    #[arg(long, default_value = "vectordb")]
    pub index: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index stats command");

        let dir = config.resolve_path(&self.index);
        let store = VectorStore::load_local(&dir)?;
        let meta = store.meta();

        if self.json {
            let output = serde_json::json!({
                "path": VectorStore::index_path(&dir),
                "provider": meta.provider,
                "model": meta.model,
                "dimensions": meta.dimensions,
                "createdAt": meta.created_at,
                "chunks": store.chunks().len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Index: {}", VectorStore::index_path(&dir).display());
            println!("Embedding: {} ({}, {} dims)", meta.model, meta.provider, meta.dimensions);
            println!("Chunks: {}", store.chunks().len());
            println!("Created: {}", meta.created_at.to_rfc3339());
        }

        Ok(())
    }
}
