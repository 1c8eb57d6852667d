//! emocrypt: encrypted emotion classification from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use eyre::{Context, Result};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use ckks::EncryptionContext;
use emocrypt::artifacts::{ArtifactStore, load_context};
use emocrypt::report::{BatchInput, BatchOutput, EmotionSummary};
use emocrypt::tensor::Tensor;
use emocrypt::{
    BackendKind, CkksBackend, ClassifierWeights, Embedder, HashingEmbedder, HomomorphicBackend, MockBackend,
    MockSecret, PipelineConfig, PipelineCoordinator, PrecomputedEmbedder, ScoreVector, StagedItem,
    WeightsSource,
};
use math::serialization::WriterTo;

#[derive(Parser)]
#[command(name = "emocrypt")]
#[command(about = "Encrypted linear emotion classification over CKKS")]
#[command(version)]
struct Cli {
    /// Pipeline configuration (JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate keys and write context.bin (contains the secret key)
    InitContext {
        /// Run directory
        #[arg(long, default_value = "emocrypt_run")]
        out_dir: PathBuf,
    },
    /// Print parameters and fingerprint of a context file
    InspectContext {
        #[arg(long)]
        context: PathBuf,
    },
    /// Classify a batch of texts
    Run(RunArgs),
    /// Convert weights between JSON and binary tensors
    ConvertWeights {
        #[arg(long)]
        json: PathBuf,
        #[arg(long)]
        weights: PathBuf,
        #[arg(long)]
        bias: PathBuf,
        /// Read the tensors and write JSON instead
        #[arg(long)]
        to_json: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Batch input: {"inputs": ["text", ...]}
    #[arg(long)]
    input: PathBuf,

    /// Weights as JSON {"weights": [[..]], "bias": [..]}
    #[arg(long, conflicts_with_all = ["weights_tensor", "bias_tensor"])]
    weights: Option<PathBuf>,

    #[arg(long, requires = "bias_tensor")]
    weights_tensor: Option<PathBuf>,

    #[arg(long, requires = "weights_tensor")]
    bias_tensor: Option<PathBuf>,

    /// Precomputed embeddings {"text": [..]}; feature hashing otherwise
    #[arg(long)]
    embeddings: Option<PathBuf>,

    /// Existing context; fresh keys are generated when omitted
    #[arg(long)]
    context: Option<PathBuf>,

    #[arg(long, default_value = "emocrypt_run")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config: PipelineConfig = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.validate().wrap_err("Invalid configuration")?;

    match cli.command {
        Command::InitContext { out_dir } => init_context(&config, &out_dir),
        Command::InspectContext { context } => inspect_context(&context),
        Command::Run(args) => run(&config, &args),
        Command::ConvertWeights {
            json,
            weights,
            bias,
            to_json,
        } => convert_weights(&config, &json, &weights, &bias, to_json),
    }
}

fn init_context(config: &PipelineConfig, out_dir: &Path) -> Result<()> {
    let start = Instant::now();
    let ctx = EncryptionContext::initialize(&config.scheme_literal()).wrap_err("Key generation failed")?;
    info!("Key generation: {:.2?}", start.elapsed());
    let store = ArtifactStore::open(out_dir)?;
    let path = store.save_context(&ctx)?;
    warn!("{} contains the secret key, keep it private", path.display());
    Ok(())
}

fn inspect_context(path: &Path) -> Result<()> {
    let ctx = load_context(path).with_context(|| format!("Failed to load context from {}", path.display()))?;
    let params = ctx.parameters();
    println!("fingerprint:   {}", ctx.fingerprint().to_hex());
    println!("N:             {}", params.n());
    println!("slots:         {}", params.slots());
    println!("log_moduli:    {:?}", params.literal().log_moduli);
    println!("q:             {:?}", params.q());
    println!("p:             {}", params.p());
    println!("log_scale:     {}", params.log_scale());
    println!("security:      {:?}", params.security());
    println!("rotation keys: {}", ctx.public().galois_keys().len());
    Ok(())
}

fn run(config: &PipelineConfig, args: &RunArgs) -> Result<()> {
    let source = match (&args.weights, &args.weights_tensor, &args.bias_tensor) {
        (Some(json), _, _) => WeightsSource::Json(json.clone()),
        (None, Some(weights), Some(bias)) => WeightsSource::Tensors {
            weights: weights.clone(),
            bias: bias.clone(),
        },
        _ => eyre::bail!("Either --weights or --weights-tensor with --bias-tensor is required"),
    };
    let weights = ClassifierWeights::load(source, config.classes, config.embedding_dim)
        .wrap_err("Failed to load classifier weights")?;

    let embedder: Arc<dyn Embedder> = match &args.embeddings {
        Some(path) => Arc::new(PrecomputedEmbedder::from_file(config.embedding_dim, path)?),
        None => Arc::new(HashingEmbedder::new(config.embedding_dim)),
    };

    let input: BatchInput = serde_json::from_slice(
        &fs::read(&args.input).with_context(|| format!("Failed to read {}", args.input.display()))?,
    )
    .wrap_err("Batch input must be {\"inputs\": [...]}")?;

    let store = ArtifactStore::open(&args.out_dir)?;
    let start = Instant::now();
    let results: Vec<emocrypt::error::Result<ScoreVector>> = match config.backend {
        BackendKind::Ckks => {
            let ctx = match &args.context {
                Some(path) => load_context(path)?,
                None => {
                    let ctx = EncryptionContext::initialize(&config.scheme_literal())?;
                    store.save_context(&ctx)?;
                    ctx
                }
            };
            process::<CkksBackend>(ctx, weights, embedder, config, &input.inputs, &store)?
        }
        BackendKind::Mock => {
            warn!("mock backend does not encrypt anything");
            let secret = MockSecret::new(config.embedding_dim.next_power_of_two());
            process::<MockBackend>(secret, weights, embedder, config, &input.inputs, &store)?
        }
    };
    info!("Processed {} inputs in {:.2?}", results.len(), start.elapsed());

    let output = BatchOutput::new(&results);
    let path = store.save_output(&output)?;
    info!("Wrote {}", path.display());

    let summary = EmotionSummary::new(&input.inputs, &results)?;
    println!("Overall emotion: {}", summary.overall_emotion);
    for (emotion, count) in summary.emotion_counts.iter() {
        println!("  {:<9} {}", emotion.label(), count);
    }
    for (i, item) in summary.items.iter().enumerate() {
        println!("[{}] [{}] {}", i + 1, item.dominant_emotion, item.text_snippet);
    }
    if !output.success {
        warn!("{} of {} inputs failed", results.iter().filter(|r| r.is_err()).count(), results.len());
    }
    Ok(())
}

fn process<B: HomomorphicBackend>(
    secret: B::Secret,
    weights: ClassifierWeights,
    embedder: Arc<dyn Embedder>,
    config: &PipelineConfig,
    texts: &[String],
    store: &ArtifactStore,
) -> Result<Vec<emocrypt::error::Result<ScoreVector>>> {
    let coordinator = PipelineCoordinator::<B>::new(secret, weights, embedder, config.coordinator_options())
        .wrap_err("Failed to start the pipeline")?;
    let items: Vec<StagedItem<B::Ciphertext>> = coordinator.process_batch_staged(texts);

    let embeddings: Vec<_> = items.iter().map(|item| item.encrypted_embedding.clone()).collect();
    let scores: Vec<_> = items.iter().map(|item| item.encrypted_scores.clone()).collect();
    store.save_embeddings(&embeddings)?;
    store.save_scores(&scores)?;
    Ok(items.into_iter().map(|item| item.result).collect())
}

fn convert_weights(config: &PipelineConfig, json: &Path, weights: &Path, bias: &Path, to_json: bool) -> Result<()> {
    if to_json {
        let loaded = ClassifierWeights::load(
            WeightsSource::Tensors {
                weights: weights.to_path_buf(),
                bias: bias.to_path_buf(),
            },
            config.classes,
            config.embedding_dim,
        )?;
        fs::write(json, loaded.to_json()?)?;
        info!("Wrote {}", json.display());
        return Ok(());
    }

    let loaded = ClassifierWeights::load(
        WeightsSource::Json(json.to_path_buf()),
        config.classes,
        config.embedding_dim,
    )?;
    let (w, b): (Tensor, Tensor) = loaded.to_tensors();
    for (tensor, path) in [(&w, weights), (&b, bias)] {
        let mut bytes: Vec<u8> = Vec::new();
        tensor.write_to(&mut bytes)?;
        fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}
