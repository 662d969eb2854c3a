use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rfprint::{Document, DocumentMeta, ExportConfig, ExportOutcome, ExportPipeline, Paper};

#[derive(Parser)]
#[command(name = "rfprint", version, about = "Export HTML invoice previews as paginated PDFs")]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rasterize, paginate and save one invoice
    Export(ExportArgs),
}

#[derive(clap::Args)]
struct ExportArgs {
    /// HTML page containing the invoice preview
    #[arg(long)]
    input: PathBuf,
    /// Invoice number; names the downloaded file
    #[arg(long)]
    number: String,
    #[arg(long, default_value = "")]
    name: String,
    /// Client the invoice belongs to
    #[arg(long, default_value = "")]
    party: String,
    #[arg(long, default_value_t = 0.0)]
    total: f64,
    /// JSON configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    selector: Option<String>,
    #[arg(long)]
    out_dir: Option<PathBuf>,
    #[arg(long)]
    persist_url: Option<String>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    scale: Option<u32>,
    #[arg(long, value_enum)]
    paper: Option<Paper>,
    /// Page margin in points
    #[arg(long)]
    margin: Option<f32>,
}

impl ExportArgs {
    fn config(&self) -> anyhow::Result<ExportConfig> {
        let mut cfg = match &self.config {
            Some(path) => ExportConfig::from_json_file(path)?,
            None => ExportConfig::default(),
        };
        if let Some(s) = &self.selector {
            cfg.selector = s.clone();
        }
        if let Some(d) = &self.out_dir {
            cfg.out_dir = d.clone();
        }
        if let Some(u) = &self.persist_url {
            cfg.persist_url = Some(u.clone());
        }
        if let Some(w) = self.width {
            cfg.design_width = w;
        }
        if let Some(s) = self.scale {
            cfg.scale = s;
        }
        if let Some(p) = self.paper {
            cfg.paper = p;
        }
        if let Some(m) = self.margin {
            cfg.margin = m;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn run_export(args: ExportArgs) -> anyhow::Result<bool> {
    let cfg = args.config()?;
    let html = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let meta = DocumentMeta {
        display_name: args.name,
        document_number: args.number,
        party_id: args.party,
        total: args.total,
    };

    let pipeline = ExportPipeline::from_config(&cfg)?;
    let document = Document::parse(&html);
    let outcome = pipeline.export(&document, &cfg.selector, &meta);
    match &outcome {
        ExportOutcome::Success(d) => println!("{} -> {}", outcome.message(), d.location.display()),
        ExportOutcome::SuccessWithPersistenceWarning { download, warning } => {
            println!("{} -> {}", outcome.message(), download.location.display());
            eprintln!("warning: {}", warning);
        }
        ExportOutcome::Failure(e) => eprintln!("{}: {}", outcome.message(), e),
    }
    Ok(outcome.is_success())
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    let _logger = match flexi_logger::Logger::try_with_env_or_str(level).and_then(|l| l.start()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("logger init failed: {}", e);
            None
        }
    };

    let result = match cli.command {
        Command::Export(args) => run_export(args),
    };
    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("rfprint: {:#}", e);
            std::process::exit(1);
        }
    }
}
