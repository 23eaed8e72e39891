mod db;
mod error;
mod parser;
mod pipeline;
mod record;
mod settings;
mod sink;
mod source;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use error::ExtractError;
use parser::images::GreedyOrder;
use parser::lines::{classify, split_lines};
use settings::Settings;
use sink::ImageStore;
use source::{PageSource, PdfSource};

#[derive(Parser)]
#[command(name = "quizbank", about = "Extract multiple-choice questions and images from a PDF question bank")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every page and write the JSON records plus image files
    Extract {
        /// Source PDF (default: data.pdf)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Directory for extracted images (default: extracted_images)
        #[arg(long)]
        image_dir: Option<PathBuf>,
        /// JSON output file (default: output.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also store the full question model in this SQLite file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show how each line of one page is classified
    Lines {
        /// 0-based page index
        #[arg(short, long)]
        page: usize,
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Summarize the SQLite store written by `extract --db`
    Stats {
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    info!(settings = ?settings, "settings loaded");

    let result = match cli.command {
        Commands::Extract { input, image_dir, output, db } => {
            let settings = settings.with_overrides(input, image_dir, output, db);
            let Some(source) = open_source(&settings.input)? else {
                return Ok(());
            };

            println!("Extracting content from PDF...");
            let store = ImageStore::new(&settings.image_dir)?;
            let pb = progress_bar(source.page_count());
            let extraction = pipeline::run(&source, &store, &GreedyOrder, &pb)?;
            pb.finish_and_clear();

            sink::write_records(&settings.output, &record::format_all(&extraction.questions))?;

            if let Some(db_path) = &settings.database {
                let conn = db::connect(db_path)?;
                db::init_schema(&conn)?;
                db::save_questions(&conn, &extraction.questions)?;
                println!("Question model saved to {}", db_path.display());
            }

            println!("Successfully extracted {} questions", extraction.questions.len());
            println!("JSON output saved to {}", settings.output.display());
            println!(
                "Images saved to {} ({} files from {} pages)",
                store.dir().display(),
                extraction.images_stored,
                extraction.pages
            );
            Ok(())
        }
        Commands::Lines { page, input } => {
            let settings = settings.with_overrides(input, None, None, None);
            let Some(source) = open_source(&settings.input)? else {
                return Ok(());
            };

            let text = source.page_text(page)?;
            let lines = split_lines(&text);
            if lines.is_empty() {
                println!("Page {} has no text.", page);
                return Ok(());
            }
            for (i, line) in lines.iter().enumerate() {
                println!("{:>4} | {:<8} | {}", i + 1, classify(line).tag(), truncate(line, 90));
            }
            println!("\n{} lines, {} images", lines.len(), source.page_images(page)?.len());
            Ok(())
        }
        Commands::Stats { db } => {
            let Some(db_path) = db.or(settings.database) else {
                println!("No database configured. Pass --db or set QUIZBANK_DATABASE.");
                return Ok(());
            };
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Questions:    {}", s.total);
            println!("Answered:     {}", s.answered);
            println!("Unanswered:   {}", s.unanswered);
            println!("With options: {}", s.with_options);
            println!("With images:  {}", s.with_images);
            if !s.by_section.is_empty() {
                println!("\n--- Sections ---");
                for (section, count) in &s.by_section {
                    let name = if section.is_empty() { "(none)" } else { section.as_str() };
                    println!("  {:<24} {:>5}", truncate(name, 24), count);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// A missing input is reported to the operator, not treated as a failure.
fn open_source(path: &Path) -> anyhow::Result<Option<PdfSource>> {
    match PdfSource::open(path) {
        Ok(source) => Ok(Some(source)),
        Err(ExtractError::InputNotFound(path)) => {
            let shown = std::path::absolute(&path).unwrap_or(path);
            println!("Error: PDF file not found at {}", shown.display());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
