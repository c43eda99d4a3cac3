mod model;

use std::path::PathBuf;
use anyhow::{Context, Result};
use candle_core::{DType, Device};
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use teppan::autoregressive::{
    BatchDecoder,
    CancellationToken,
    CompletionOptions,
    GenerationLimits,
    GenerationResult,
    DEFAULT_MAX_BATCH_SIZE,
    DEFAULT_MAX_GEN_LEN,
    DEFAULT_MAX_SEQ_LEN,
};
use teppan::backend::candle::CandleModel;
use teppan::backend::huggingface::HfTokenizer;
use teppan::sampler::{SamplingConfig, DEFAULT_TEMPERATURE, DEFAULT_TOP_P};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use crate::model::LlamaNetwork;

const RULE: &str = "==================================";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Precision {
    F32,
    F16,
    Bf16,
}

impl From<Precision> for DType {
    fn from(precision: Precision) -> Self {
        match precision {
            Precision::F32 => DType::F32,
            Precision::F16 => DType::F16,
            Precision::Bf16 => DType::BF16,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "text-completion", about = "Complete prompts with a Llama checkpoint")]
struct Args {
    /// Directory holding config.json and the *.safetensors weights
    #[arg(long)]
    ckpt_dir: PathBuf,

    /// Path to tokenizer.json
    #[arg(long)]
    tokenizer_path: PathBuf,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    #[arg(long, default_value_t = DEFAULT_TOP_P)]
    top_p: f32,

    #[arg(long, default_value_t = DEFAULT_MAX_SEQ_LEN)]
    max_seq_len: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_GEN_LEN)]
    max_gen_len: usize,

    /// Generate until max_seq_len instead of stopping after max_gen_len tokens
    #[arg(long, conflicts_with = "max_gen_len")]
    fill_context: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    max_batch_size: usize,

    /// Prompt to complete; repeat for several. Prompts are decoded max_batch_size at a time
    #[arg(long = "prompt", default_value = "huggingface is an company")]
    prompts: Vec<String>,

    #[arg(long, default_value_t = 299792458)]
    seed: u64,

    /// Include the prompt in each completion
    #[arg(long)]
    echo: bool,

    /// Report per-token log-probabilities
    #[arg(long)]
    logprobs: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[arg(long, default_value = "</s>")]
    eos_token: String,

    #[arg(long, value_enum, default_value_t = Precision::F32)]
    dtype: Precision,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_text(results: &[GenerationResult]) {
    for result in results {
        println!("\n{RULE}\n");
        println!("{}", result.prompt);
        println!("{}", result.generated_text);
        if let Some(logprobs) = &result.logprobs {
            println!("logprobs: {logprobs:?}");
        }
        println!("\n{RULE}\n");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let limits = if args.fill_context {
        GenerationLimits::unbounded_generation(args.max_seq_len, args.max_batch_size)?
    } else {
        GenerationLimits::new(args.max_seq_len, args.max_gen_len, args.max_batch_size)?
    };
    let config = SamplingConfig::new(args.temperature, args.top_p)?;
    let options = CompletionOptions { echo: args.echo, logprobs: args.logprobs };

    let tokenizer = HfTokenizer::from_file(&args.tokenizer_path, &args.eos_token)
        .with_context(|| format!("loading tokenizer from {}", args.tokenizer_path.display()))?;
    let network = LlamaNetwork::load(&args.ckpt_dir, args.dtype.into(), &Device::Cpu)?;
    let mut decoder = BatchDecoder::new(CandleModel::new(network), tokenizer, limits)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        }
    });

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut results = Vec::with_capacity(args.prompts.len());
    for (index, batch) in args.prompts.chunks(limits.max_batch_size).enumerate() {
        info!(batch = index, prompts = batch.len(), "decoding batch");
        let completed = decoder.complete(batch, &config, &options, &mut rng, &cancel)
            .await
            .with_context(|| format!("completing batch {index}"))?;
        results.extend(completed);
    }

    match args.format {
        Format::Text => print_text(&results),
        Format::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }
    Ok(())
}
