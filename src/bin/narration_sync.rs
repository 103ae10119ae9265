use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use narration_sync::jobs::TaskQueue;
use narration_sync::pipeline::defaults::FuzzyReferenceMatcher;
use narration_sync::pipeline::traits::ReferenceMatcher;
use narration_sync::{Segment, SyncConfig, VisualAligner, VisualAlignerBuilder, WordTiming};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[path = "narration_sync/report_writer.rs"]
mod report_writer;

use report_writer::{write_report, ProjectEntry, RunReport};

#[derive(Debug, Parser)]
#[command(name = "narration-sync")]
#[command(about = "Align visuals to narration word timings and persist the timeline")]
struct Args {
    /// JSON configuration file; built-in defaults apply when omitted.
    #[arg(long, global = true, env = "NARRATION_SYNC_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = "NARRATION_SYNC_STORE_DIR")]
    store_dir: Option<PathBuf>,
    #[arg(long, global = true, env = "NARRATION_SYNC_MEDIA_ROOT")]
    media_root: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Organize one segment and write it into its project.
    Segment {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        section_id: String,
        /// Segment JSON as sent by the editor.
        #[arg(long)]
        segment_file: PathBuf,
    },
    /// Organize every segment of one or more stored projects.
    Project {
        #[arg(required = true)]
        project_ids: Vec<String>,
        #[arg(long, env = "NARRATION_SYNC_REPORT_OUT")]
        report_out: Option<PathBuf>,
    },
    /// Locate a reference text in a word timing file and print the match.
    Match {
        #[arg(long)]
        reference: String,
        #[arg(long)]
        timings: PathBuf,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "narration_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run() {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let config = load_config(&args)?;

    match args.command {
        Command::Segment {
            project_id,
            section_id,
            segment_file,
        } => {
            let aligner = build_aligner(config)?;
            let segment = read_segment(&segment_file)?;
            let alignment = aligner
                .organize_segment_in_project(&project_id, &section_id, segment)
                .map_err(|err| err.to_string())?;
            print_json(&serde_json::json!({ "organized_segment": alignment.segment }))
        }
        Command::Project {
            project_ids,
            report_out,
        } => {
            let queue_config = config.queue;
            let aligner = build_aligner(config)?;
            let entries = organize_projects(&aligner, &queue_config, project_ids);
            let failed = entries.iter().filter(|entry| entry.error.is_some()).count();
            let report = RunReport::new(entries);
            if let Some(path) = report_out {
                write_report(&path, &report)?;
                tracing::info!(path = %path.display(), "report written");
            }
            print_json(&report.summary)?;
            if failed > 0 {
                return Err(format!("{failed} project(s) failed"));
            }
            Ok(())
        }
        Command::Match { reference, timings } => {
            let data = fs::read_to_string(&timings)
                .map_err(|err| format!("Failed to read '{}': {err}", timings.display()))?;
            let words: Vec<WordTiming> = narration_sync::extract::parse_word_timings(&data)
                .map_err(|err| err.to_string())?;
            let matcher = FuzzyReferenceMatcher::new(config.matching);
            print_json(&matcher.locate(&reference, &words))
        }
    }
}

fn load_config(args: &Args) -> Result<SyncConfig, String> {
    let mut config = match &args.config {
        Some(path) => SyncConfig::load(path).map_err(|err| err.to_string())?,
        None => SyncConfig::default(),
    };
    if let Some(store_dir) = &args.store_dir {
        config.store_dir = store_dir.clone();
    }
    if let Some(media_root) = &args.media_root {
        config.media_root = media_root.clone();
    }
    Ok(config)
}

fn build_aligner(config: SyncConfig) -> Result<VisualAligner, String> {
    VisualAlignerBuilder::new(config)
        .build()
        .map_err(|err| err.to_string())
}

fn read_segment(path: &Path) -> Result<Segment, String> {
    let data = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read segment file '{}': {err}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|err| format!("Failed to parse segment JSON '{}': {err}", path.display()))
}

fn organize_projects(
    aligner: &VisualAligner,
    queue_config: &narration_sync::config::QueueConfig,
    project_ids: Vec<String>,
) -> Vec<ProjectEntry> {
    let progress = ProgressBar::new(project_ids.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("starting...");

    let mut queue = TaskQueue::new(queue_config);
    let outcomes = queue.run(
        project_ids,
        |project_id| {
            progress.set_message(project_id.to_string());
            aligner.organize_project(project_id)
        },
        |_| progress.inc(1),
    );
    progress.finish_with_message("alignment pass complete");

    outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(alignment) => ProjectEntry {
                project_id: outcome.key,
                attempts: outcome.attempts,
                revision: Some(alignment.revision),
                error: None,
                segments: alignment.reports,
            },
            Err(err) => ProjectEntry {
                project_id: outcome.key,
                attempts: outcome.attempts,
                revision: None,
                error: Some(err.to_string()),
                segments: Vec::new(),
            },
        })
        .collect()
}

fn print_json(value: &impl serde::Serialize) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| format!("Failed to serialize output: {err}"))?;
    println!("{text}");
    Ok(())
}
