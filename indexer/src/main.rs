use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use sri_core::{EngineConfig, IndexCoordinator, Model, NewDocument, SledRepository};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    title: String,
    #[serde(alias = "text")]
    body: String,
}

#[derive(Parser)]
#[command(name = "sri-indexer")]
#[command(about = "Load documents and manage the TF-IDF and BM25 indices", long_about = None)]
struct Cli {
    /// Data directory holding the document store and both indices
    #[arg(long, default_value = "./data", global = true)]
    data: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store and index documents from JSON/JSONL files or a directory of them
    Load {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Documents per store batch
        #[arg(long, default_value_t = 500)]
        batch_size: usize,
    },
    /// Rebuild both indices from the document store
    Reindex,
    /// Run a query and print ranked hits
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// Ranking model: tfidf or bm25
        #[arg(long, default_value = "bm25")]
        model: String,
    },
    /// Print per-model index statistics
    Stats,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let engine = open_engine(&cli.data)?;

    match cli.command {
        Commands::Load { input, batch_size } => load(&engine, &input, batch_size),
        Commands::Reindex => {
            let num_docs = engine.reindex_all()?;
            println!("reindexed {num_docs} documents");
            Ok(())
        }
        Commands::Search { query, k, model } => {
            let model: Model = model.parse()?;
            for hit in engine.search_scored(&query, k, model)? {
                let title = engine.get_document(hit.doc_id).map(|d| d.title).unwrap_or_default();
                println!("{:>8}  {:>10.4}  {}", hit.doc_id, hit.score, title);
            }
            Ok(())
        }
        Commands::Stats => {
            for model in Model::ALL {
                println!(
                    "{model}: {} documents, avg length {:.2}",
                    engine.total_document_count(model),
                    engine.average_document_length(model)
                );
            }
            Ok(())
        }
    }
}

fn open_engine(data: &Path) -> Result<IndexCoordinator<SledRepository>> {
    let repo = SledRepository::open(data.join("documents")).context("opening document store")?;
    let config = EngineConfig::under(data.join("index")).from_env()?;
    Ok(IndexCoordinator::open(repo, &config)?)
}

fn load(engine: &IndexCoordinator<SledRepository>, input: &Path, batch_size: usize) -> Result<()> {
    let files = collect_input_files(input);
    let mut total = 0usize;
    for file in files {
        let docs = read_docs(&file).with_context(|| format!("reading {}", file.display()))?;
        for chunk in docs.chunks(batch_size.max(1)) {
            total += engine.create_documents(chunk.to_vec())?.len();
        }
        tracing::info!(file = %file.display(), total, "loaded file");
    }
    engine.flush()?;
    tracing::info!(total, "load complete");
    println!("loaded {total} documents");
    Ok(())
}

fn collect_input_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn read_docs(file: &Path) -> Result<Vec<NewDocument>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            docs.push(into_new(serde_json::from_str(&line)?));
        }
        return Ok(docs);
    }
    match serde_json::from_reader(reader)? {
        serde_json::Value::Array(arr) => {
            for v in arr {
                docs.push(into_new(serde_json::from_value(v)?));
            }
        }
        obj @ serde_json::Value::Object(_) => docs.push(into_new(serde_json::from_value(obj)?)),
        _ => {}
    }
    Ok(docs)
}

fn into_new(doc: InputDoc) -> NewDocument { NewDocument::new(doc.title, doc.body) }
