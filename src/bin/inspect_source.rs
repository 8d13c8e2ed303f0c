use anyhow::{Context, Result};
use clap::Parser;
use cordscope::{
    config::RowCap,
    fetch::{Acquirer, Strategy},
    process::{candidates, classify, normalize},
    Error,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "Show how a source's date column is detected and parsed")]
struct Args {
    /// URL, Drive link, `gdrive:<id>` or local path.
    source: String,
    /// Maximum records to load, or `none`.
    #[arg(long, default_value = "50000")]
    row_cap: RowCap,
    #[arg(long, value_enum, default_value_t = Strategy::Auto)]
    strategy: Strategy,
    #[arg(long, default_value = "./staging")]
    staging_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut acquirer = Acquirer::new(args.strategy, args.staging_dir.clone())?;
    let table = acquirer
        .acquire(&args.source, args.row_cap.0)
        .await
        .with_context(|| format!("loading {}", args.source))?;
    let mut table = (*table).clone();

    println!("{} records, {} columns", table.len(), table.columns.len());
    for (i, c) in table.columns.iter().enumerate() {
        println!("  [{:>2}] {}", i, c);
    }

    let all = candidates(&table.columns);
    println!("date-like columns: {}", if all.is_empty() { "-".to_string() } else { all.join(", ") });

    let Some(column) = classify(&table.columns) else {
        warn!("no publication date column");
        return Ok(());
    };
    println!("chosen: {}", column);

    match normalize(&mut table, &column) {
        Ok(s) => {
            let rate = s.valid as f64 / s.records.max(1) as f64 * 100.0;
            println!(
                "parsed {}/{} ({:.1}%), {} unparseable",
                s.valid, s.records, rate, s.unparseable
            );
        }
        Err(Error::NoValidDates { column, records }) => {
            println!("no value in `{}` parsed ({} records)", column, records);
        }
        Err(e) => return Err(e.into()),
    }

    info!("done");
    Ok(())
}
