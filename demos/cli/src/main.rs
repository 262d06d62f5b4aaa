use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use qrda_cat1::Cat1Importer;
use qrda_core::{ImportConfig, RankPolicy, WarningKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "qrda-cli",
    about = "Nhập hồ sơ bệnh nhân từ tài liệu QRDA Category I."
)]
struct Args {
    /// Đường dẫn tới file XML QRDA.
    #[arg(short, long)]
    input: PathBuf,

    /// In toàn bộ kết quả dạng JSON.
    #[arg(long)]
    json: bool,

    /// Bỏ trống `rank` không hợp lệ thay vì lấy phần số ở đầu.
    #[arg(long)]
    strict_rank: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("qrda_cat1=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Không đọc được file {:?}", args.input))?;

    let config = ImportConfig {
        rank_policy: if args.strict_rank {
            RankPolicy::Reject
        } else {
            RankPolicy::Coerce
        },
        ..ImportConfig::default()
    };
    let importer = Cat1Importer::with_config(config).context("Không tạo được importer")?;
    let outcome = importer
        .import_str(&data)
        .with_context(|| format!("Không nhập được {:?}", args.input))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!(
        "Data elements: {}\nCodes: {}\nWarnings: {} ({} duplicate ids, {} unparsable, {} unresolved references)",
        outcome.patient.data_elements.len(),
        outcome.codes.len(),
        outcome.warnings.len(),
        outcome.warnings_of(WarningKind::DuplicateIdentifier),
        outcome.warnings_of(WarningKind::UnparsableTemplate),
        outcome.warnings_of(WarningKind::UnresolvedReference),
    );
    for warning in &outcome.warnings {
        println!("  - {}", warning.message);
    }

    Ok(())
}
