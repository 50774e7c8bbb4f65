//! CLI for Lumina - composite a subject onto a backdrop.

use clap::{Args, Parser, Subcommand, ValueEnum};
use lumina::{
    CancelToken, Compositor, GeminiCompositor, GeminiModel, ProcessingStatus, Slot, Studio,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumina")]
#[command(about = "Composite a subject onto a backdrop with Gemini image editing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a composition from a backdrop and a subject image
    Compose(ComposeArgs),

    /// Check that the API key and model are usable
    Check(BackendArgs),
}

#[derive(Args)]
struct BackendArgs {
    /// Model to use
    #[arg(short, long, value_enum, default_value = "nano-banana")]
    model: ModelArg,

    /// API key (defaults to GOOGLE_API_KEY, then API_KEY)
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args)]
struct ComposeArgs {
    /// Background scene image
    #[arg(short, long)]
    backdrop: PathBuf,

    /// Image containing the subject to place on the backdrop
    #[arg(short, long)]
    asset: PathBuf,

    /// Extra instruction appended to the prompt
    #[arg(short, long)]
    instruction: Option<String>,

    /// Directory the result is saved into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    NanoBanana,
    NanoBananaPro,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::NanoBanana => GeminiModel::NanoBanana,
            ModelArg::NanoBananaPro => GeminiModel::NanoBananaPro,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lumina=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compose(args) => compose(args, cli.json).await?,
        Commands::Check(args) => check(args, cli.json).await?,
    }

    Ok(())
}

fn build_compositor(args: &BackendArgs) -> lumina::Result<GeminiCompositor> {
    let mut builder = GeminiCompositor::builder().model(args.model.into());
    if let Some(key) = &args.api_key {
        builder = builder.api_key(key);
    }
    builder.build()
}

async fn compose(args: ComposeArgs, json_output: bool) -> anyhow::Result<()> {
    if !args.output_dir.is_dir() {
        anyhow::bail!("output directory {} does not exist", args.output_dir.display());
    }

    let mut studio = Studio::new(build_compositor(&args.backend)?);

    for (slot, path) in [(Slot::Backdrop, &args.backdrop), (Slot::Asset, &args.asset)] {
        let file = lumina::read_file(path)?;
        if let Err(e) = studio.select_image(slot, &file) {
            anyhow::bail!("{} {}: {}", slot, path.display(), e);
        }
    }
    if let Some(instruction) = args.instruction {
        studio.set_instruction(instruction)?;
    }

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    tracing::info!(model = studio.compositor().model(), "generating composition");
    let status = studio.generate(&cancel).await?;

    match status {
        ProcessingStatus::Completed => {
            let path = studio
                .download(&args.output_dir)?
                .ok_or_else(|| anyhow::anyhow!("composition finished without a result"))?;
            let size_bytes = std::fs::metadata(&path)?.len();

            if json_output {
                let result = serde_json::json!({
                    "success": true,
                    "status": status,
                    "output": path.display().to_string(),
                    "size_bytes": size_bytes,
                    "model": studio.compositor().model(),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "Saved composition: {} ({} bytes) via {}",
                    path.display(),
                    size_bytes,
                    studio.compositor().model()
                );
            }
            Ok(())
        }
        ProcessingStatus::Idle => {
            if json_output {
                let result = serde_json::json!({ "success": false, "status": status, "cancelled": true });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                eprintln!("Composition cancelled");
            }
            Ok(())
        }
        _ => {
            let message = studio
                .state()
                .error()
                .unwrap_or(lumina::GENERIC_FAILURE_MESSAGE)
                .to_string();
            if json_output {
                let result = serde_json::json!({ "success": false, "status": status, "error": message });
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            anyhow::bail!(message)
        }
    }
}

async fn check(args: BackendArgs, json_output: bool) -> anyhow::Result<()> {
    let compositor = build_compositor(&args)?;
    let result = compositor.health_check().await;

    if json_output {
        let report = serde_json::json!({
            "model": compositor.model(),
            "api_key_set": compositor.has_api_key(),
            "ok": result.is_ok(),
            "error": result.as_ref().err().map(|e| e.user_message()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &result {
            Ok(()) => println!("✓ {} is reachable", compositor.model()),
            Err(e) => println!("✗ {}: {}", compositor.model(), e),
        }
    }

    result.map_err(Into::into)
}
