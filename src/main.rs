//! paperfig - Entry Point
//!
//! Reads a methodology file and a caption, runs one generation, and writes
//! the artifact plus the history document under the output directory.

use paperfig::{
    load_reference_set, reference_set_stats, Config, GeminiProvider, GenerationRequest, Pipeline,
};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("paperfig v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: paperfig <methodology-file> <caption> [reference-set.json]");
        println!();
        println!("Environment variables:");
        println!("  GEMINI_API_KEY                  Gemini API key (required)");
        println!("  PAPERFIG_MODE                   diagram | plot (default: diagram)");
        println!("  PAPERFIG_MAX_ITERATIONS         Refinement bound (default: 3)");
        println!("  PAPERFIG_NUM_REFERENCES         References to retrieve (default: 10)");
        println!("  PAPERFIG_SKIP_RETRIEVAL         Ablation: skip retrieval");
        println!("  PAPERFIG_SKIP_STYLING           Ablation: skip styling");
        println!("  PAPERFIG_SKIP_REFINEMENT        Ablation: render once, no critique");
        println!("  PAPERFIG_OUTPUT_DIR             Artifact directory (default: output)");
        println!("  PAPERFIG_PROVIDER_TIMEOUT_SECS  Per-call deadline (default: 120)");
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let positional: Vec<&String> = args.iter().skip(1).filter(|a| !a.starts_with('-')).collect();
    let [methodology_path, caption, rest @ ..] = positional.as_slice() else {
        anyhow::bail!("usage: paperfig <methodology-file> <caption> [reference-set.json]");
    };

    let methodology = std::fs::read_to_string(methodology_path)?;

    let reference_set = match rest.first() {
        Some(path) => {
            let refs = load_reference_set(path)?;
            let stats = reference_set_stats(&refs);
            info!(
                total = stats.total,
                domains = stats.domains.len(),
                "reference set loaded"
            );
            refs
        }
        None => Vec::new(),
    };

    let config = Config::from_env()?;
    let provider = Arc::new(GeminiProvider::from_env()?);
    let pipeline = Pipeline::new(provider, config)?;

    let request = GenerationRequest::new(methodology, caption.as_str())
        .with_reference_set(reference_set);

    match pipeline.generate(&request).await {
        Ok(result) => {
            println!("Final artifact: {}", result.artifact.path().display());
            println!(
                "Iterations: {} ({:?})",
                result.iterations_performed, result.termination
            );
            Ok(())
        }
        Err(failed) => {
            for note in &failed.history.terminal_notes {
                eprintln!("  {note}");
            }
            Err(failed.into())
        }
    }
}
