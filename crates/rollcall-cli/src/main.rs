use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rollcall_core::{CosineMatcher, FaceLocator, Gallery, SeetaDetector};
use rollcalld::api::routes::format_timestamp;
use rollcalld::engine::{self, FaceMode};
use rollcalld::store::Store;
use rollcalld::{AttendanceService, Config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance administration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered students
    Students,
    /// Show the most recent attendance records
    Recent {
        /// Number of records to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Rebuild stored descriptors from the reference-image archive.
    ///
    /// Writes the database only; a running rollcalld keeps its in-memory
    /// gallery until it is restarted.
    Reindex,
    /// Run detection and matching on an image file without recording attendance
    Probe {
        /// Path to a JPEG or PNG
        image: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Students => {
            let store = Store::open(&config.db_path).await?;
            let students = store.list_students().await?;
            if students.is_empty() {
                println!("No students registered");
            }
            for s in students {
                let indexed = if s.descriptor.is_some() { "" } else { " (no descriptor)" };
                println!(
                    "{:>4}  {:<32} {}{indexed}",
                    s.id,
                    s.name,
                    format_timestamp(s.registered_at)
                );
            }
        }
        Commands::Recent { limit } => {
            let store = Store::open(&config.db_path).await?;
            let entries = store.recent_attendance(limit).await?;
            if entries.is_empty() {
                println!("No attendance recorded yet");
            }
            for e in entries {
                println!("{}  {}", format_timestamp(e.record.timestamp), e.student_name);
            }
        }
        Commands::Reindex => {
            let service = AttendanceService::open(&config).await?;
            let report = service.rebuild_from_archive(Utc::now()).await?;
            println!(
                "Indexed {} face(s) from {}, skipped {}",
                report.indexed,
                config.faces_dir.display(),
                report.skipped
            );
            println!("Restart rollcalld to load the rebuilt gallery");
        }
        Commands::Probe { image, json } => probe(&config, image, json).await?,
    }

    Ok(())
}

async fn probe(config: &Config, path: PathBuf, json: bool) -> Result<()> {
    let frame = image::open(&path).with_context(|| format!("failed to read {}", path.display()))?;

    let detector = SeetaDetector::load(&config.detector_model, config.detector.clone())?;
    let locator = FaceLocator::new(Box::new(detector), config.detector.clone());
    let analysis = engine::analyze_image(&locator, &frame, FaceMode::Largest, false)?;

    let store = Store::open(&config.db_path).await?;
    let gallery = Gallery::from_entries(store.load_gallery().await?);
    let result = gallery.best_match(&CosineMatcher, &analysis.descriptor, config.similarity_threshold);

    if json {
        let out = serde_json::json!({
            "faces": analysis.candidates,
            "rect": {
                "x": analysis.rect.x,
                "y": analysis.rect.y,
                "width": analysis.rect.width,
                "height": analysis.rect.height,
            },
            "matched": result.matched,
            "name": result.name,
            "similarity": result.similarity,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Faces detected: {}", analysis.candidates);
    println!(
        "Subject:        {}x{} at ({}, {})",
        analysis.rect.width, analysis.rect.height, analysis.rect.x, analysis.rect.y
    );
    match result.name {
        Some(name) if result.matched => {
            println!("Match:          {name} (similarity {:.3})", result.similarity)
        }
        _ => println!(
            "Match:          none (best similarity {:.3}, threshold {:.2})",
            result.similarity, config.similarity_threshold
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
        let cli = Cli::try_parse_from(["rollcall", "recent", "--limit", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Recent { limit: 3 }));
    }

    #[test]
    fn test_reindex_help_mentions_restart() {
        let cmd = Cli::command();
        let reindex = cmd.find_subcommand("reindex").unwrap();
        let help = reindex.get_long_about().unwrap().to_string();
        assert!(help.contains("until it is restarted"));
    }
}
