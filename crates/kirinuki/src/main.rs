//! Command-line front end: submit prompts, drain the draft queue,
//! finish everything that drafted, and write the transparent PNGs to
//! an output directory.

use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use kirinuki_export::DirectoryExport;
use kirinuki_matte::MatteConfig;
use kirinuki_service::{GeminiClient, GeminiConfig};
use kirinuki_session::{FinishConfig, Session, StickerStatus};
use tracing_subscriber::EnvFilter;

/// Generate transparent die-cut stickers from a text prompt.
///
/// Each line of the prompt (or each distinct item the splitter finds
/// in it) becomes its own batch of four draft variants. Reads the API
/// credential from `GEMINI_API_KEY`.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// What to draw. Describe several stickers on separate lines.
    prompt: String,

    /// Guidance image attached to every batch.
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Directory finished stickers are written into.
    #[arg(short, long, default_value = "stickers")]
    out_dir: PathBuf,

    /// Edge length of the finished stickers in pixels.
    #[arg(long, default_value_t = 4096)]
    size: u32,

    /// Stay on the baseline fidelity tier (caps output at 1024px and
    /// never requests elevated access).
    #[arg(long)]
    standard: bool,

    /// Recovered alpha below this is forced fully transparent.
    #[arg(long, default_value_t = 10)]
    transparent_cutoff: u8,

    /// Recovered alpha above this is forced fully opaque.
    #[arg(long, default_value_t = 245)]
    opaque_cutoff: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let target_size = if args.standard {
        args.size.min(1024)
    } else {
        args.size
    };
    let service_config = GeminiConfig {
        allow_elevated: !args.standard,
        ..GeminiConfig::from_env()
    };
    let finish_config = FinishConfig {
        target_size,
        matte: MatteConfig {
            transparent_cutoff: args.transparent_cutoff,
            opaque_cutoff: args.opaque_cutoff,
        },
        ..FinishConfig::default()
    };

    let reference = match &args.reference {
        Some(path) => Some(std::fs::read(path)?),
        None => None,
    };

    let service = Rc::new(GeminiClient::new(service_config)?);
    let export = Rc::new(DirectoryExport::new(&args.out_dir));
    let session = Session::new(service, export, finish_config);

    let batches = session.submit(&args.prompt, reference).await;
    eprintln!("Generating {} batch(es) of drafts...", batches.len());
    session.process_queue().await;
    if let Some(notice) = session.take_notice() {
        eprintln!("warning: {notice}");
    }

    session.select_all();
    let selected = session.selection().len();
    if selected == 0 {
        eprintln!("No drafts to finish.");
        return Ok(());
    }

    eprintln!("Finishing {selected} sticker(s) at {target_size}px...");
    session.process_selected().await;

    let mut finished = 0usize;
    for entity in session.entities() {
        let label = match entity.status {
            StickerStatus::Complete => {
                finished += 1;
                "done"
            }
            StickerStatus::Failed => "failed",
            _ => "pending",
        };
        eprintln!(
            "  {:>6}  {}  {}",
            label,
            entity.id,
            entity.prompt.as_deref().unwrap_or("-"),
        );
    }
    eprintln!(
        "{finished}/{selected} sticker(s) written to {}.",
        args.out_dir.display(),
    );
    Ok(())
}
