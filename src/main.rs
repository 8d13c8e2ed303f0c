use anyhow::{Context, Result};
use clap::Parser;
use cordscope::{
    config::{RowCap, Settings},
    fetch::Strategy,
    report, Explorer,
};
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "CORD-19 metadata explorer")]
struct Args {
    /// YAML settings file; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// URL, Drive link, `gdrive:<id>` or local path of the metadata CSV.
    #[arg(short, long, env = "CORDSCOPE_SOURCE")]
    source: Option<String>,

    /// Maximum records to load, or `none` for the whole file.
    #[arg(long)]
    row_cap: Option<RowCap>,

    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    #[arg(long)]
    staging_dir: Option<PathBuf>,

    #[arg(long)]
    top_k: Option<usize>,

    #[arg(long)]
    category_column: Option<String>,

    #[arg(long)]
    display_limit: Option<usize>,

    #[arg(long)]
    preview_rows: Option<usize>,

    /// Year to filter by; defaults to the earliest available year.
    #[arg(short, long)]
    year: Option<i32>,

    /// Print a JSON summary instead of the text dashboard.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let mut s = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(v) = &self.source {
            s.source = v.clone();
        }
        if let Some(RowCap(v)) = self.row_cap {
            s.row_cap = v;
        }
        if let Some(v) = self.strategy {
            s.strategy = v;
        }
        if let Some(v) = &self.staging_dir {
            s.staging_dir = v.clone();
        }
        if let Some(v) = self.top_k {
            s.top_k = v;
        }
        if let Some(v) = &self.category_column {
            s.category_column = v.clone();
        }
        if let Some(v) = self.display_limit {
            s.display_limit = v;
        }
        if let Some(v) = self.preview_rows {
            s.preview_rows = v;
        }
        s.validate()?;
        Ok(s)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) settings ─────────────────────────────────────────────────
    let args = Args::parse();
    let settings = args.settings().context("resolving settings")?;
    info!(source = %settings.source, row_cap = ?settings.row_cap, "startup");

    // ─── 3) load + build dashboard ───────────────────────────────────
    let mut explorer = Explorer::new(settings).context("creating HTTP client")?;
    let start = Instant::now();
    let dashboard = match explorer.load().await {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "failed to load data");
            return Err(e).context("loading dataset");
        }
    };
    info!(elapsed = ?start.elapsed(), "dashboard ready");

    // ─── 4) render ───────────────────────────────────────────────────
    if args.json {
        let summary = report::summary(&dashboard, args.year);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", report::render_dashboard(&dashboard, args.year));
    }
    Ok(())
}
