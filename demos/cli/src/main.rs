use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use caregap_core::dates::format_display_date;
use caregap_core::{CareGapConfig, CareSnapshot, Repository};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod seed;

#[derive(Parser, Debug)]
#[command(
    name = "caregap-cli",
    about = "Dựng timeline chăm sóc và phát hiện care gap từ dữ liệu mẫu, bundle FHIR hoặc bản tin xét nghiệm."
)]
struct Args {
    /// Đường dẫn tới file JSON bundle. Không có thì dùng bệnh nhân mẫu.
    #[arg(short, long)]
    bundle: Option<PathBuf>,

    /// Mã bệnh nhân cần báo cáo. Mặc định là bệnh nhân của bundle hoặc bệnh nhân mẫu đầu tiên.
    #[arg(short, long)]
    patient: Option<String>,

    /// Các file bản tin xét nghiệm phân tách bằng `|`, nhập theo thứ tự.
    #[arg(short, long)]
    message: Vec<PathBuf>,

    /// File JSON ghi đè ngưỡng care gap.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ngày đánh giá (YYYY-MM-DD). Mặc định là hôm nay.
    #[arg(long)]
    today: Option<NaiveDate>,

    /// In snapshot dạng JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("caregap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Không đọc được file cấu hình {path:?}"))?;
            serde_json::from_str::<CareGapConfig>(&data)
                .with_context(|| format!("Cấu hình không hợp lệ {path:?}"))?
        }
        None => CareGapConfig::default(),
    };

    let mut repository = seed::seed_repository();
    let mut default_patient = repository.patient_ids().next().map(str::to_string);

    if let Some(path) = &args.bundle {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Không đọc được file {path:?}"))?;
        let set = caregap_fhir::parse_bundle_str(&data)
            .with_context(|| format!("could not ingest bundle {path:?}"))?;
        default_patient = Some(set.patient.id.clone());
        repository = repository.with_set(set);
    }

    let Some(patient_id) = args.patient.clone().or(default_patient) else {
        bail!("no patient available");
    };

    for path in &args.message {
        repository = ingest_message_file(&repository, &patient_id, path)?;
    }

    let set = repository
        .get(&patient_id)
        .with_context(|| format!("unknown patient {patient_id}"))?;
    let today = args.today.unwrap_or_else(|| Utc::now().date_naive());
    let snapshot = CareSnapshot::compute_on(set, &config, today);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }

    Ok(())
}

fn ingest_message_file(
    repository: &Repository,
    patient_id: &str,
    path: &Path,
) -> anyhow::Result<Repository> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Không đọc được bản tin {path:?}"))?;
    let observation = caregap_hl7::parse_message(&data, patient_id)
        .with_context(|| format!("could not ingest message {path:?}"))?;
    Ok(repository.with_observation(patient_id, observation)?)
}

fn print_snapshot(snapshot: &CareSnapshot) {
    println!(
        "Patient: {} ({})",
        snapshot.patient.display_name(),
        snapshot.patient.id
    );

    println!("\nTimeline events: {}", snapshot.timeline().len());
    for event in snapshot.timeline() {
        let detail = event
            .detail
            .as_deref()
            .map(|detail| format!(" - {detail}"))
            .unwrap_or_default();
        println!(
            "  {:>12}  [{}] {}{}",
            format_display_date(event.date),
            event.kind.name(),
            event.label,
            detail
        );
    }

    println!("\nCare gaps: {}", snapshot.gaps().len());
    for gap in snapshot.gaps() {
        let last = gap
            .last_date
            .map(|date| format!(" (last {})", format_display_date(date)))
            .unwrap_or_default();
        println!("  [{:?}] {}{}", gap.severity, gap.label, last);
        println!("      -> {}", gap.recommendation);
    }
}
