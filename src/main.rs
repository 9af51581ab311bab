use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use refactor_audit::config::{discover, TrackerConfig};
use refactor_audit::snapshot::load_history_dir;
use refactor_audit::{
    detector, CodeIssue, DocumentKey, LoggingSink, MemorySnapshotStore, NullSink, SnapshotProvider,
    SyntaxTree, TextEdit, TrackReport, TrackerContext,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "refactor-audit")]
#[command(about = "Detect refactorings in a file's history and check they were completed", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./refactor-audit.toml, then ~/.config/refactor-audit/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every enabled detector on two versions of a file
    Detect {
        before: PathBuf,
        after: PathBuf,
    },

    /// Mine a directory of file versions and report incomplete refactorings
    Track {
        /// Directory holding one `.rs` file per version, oldest name first;
        /// with --recursive, every subdirectory holding versions is a document
        history: PathBuf,

        /// Treat each subdirectory as the history of its own document
        #[arg(short, long)]
        recursive: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Show a diff preview of each suggested fix
        #[arg(short, long)]
        diff: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = env::current_dir().context("cannot read working directory")?;
    let (config, source) = discover(cli.config.as_deref(), &cwd)?;
    if let Some(path) = &source {
        tracing::debug!(path = %path.display(), "using config");
    }

    match cli.command {
        Commands::Detect { before, after } => cmd_detect(&config, &before, &after),
        Commands::Track {
            history,
            recursive,
            json,
            diff,
        } => cmd_track(config, &history, recursive, json, diff),
        Commands::Config => cmd_config(&config, source.as_deref()),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn parse_file(path: &Path) -> Result<Arc<SyntaxTree>> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let tree = SyntaxTree::parse(&text).with_context(|| format!("cannot parse {}", path.display()))?;
    Ok(Arc::new(tree))
}

fn cmd_detect(config: &TrackerConfig, before: &Path, after: &Path) -> Result<()> {
    let before_tree = parse_file(before)?;
    let after_tree = parse_file(after)?;
    let settings = config.detection();

    let mut total = 0;
    for kind in &config.detectors.enabled {
        for refactoring in detector(*kind).detect(&before_tree, &after_tree, &settings) {
            total += 1;
            println!("{} {}", format!("[{kind}]").cyan(), refactoring.summary());
        }
    }

    if total == 0 {
        println!("{}", "No refactorings detected".dimmed());
    }
    Ok(())
}

/// Directories under `root` that directly contain `.rs` versions.
fn history_dirs(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !recursive {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.with_context(|| format!("cannot walk {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let has_versions = fs::read_dir(entry.path())?
            .filter_map(|e| e.ok())
            .any(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"));
        if has_versions {
            dirs.push(entry.path().to_path_buf());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn document_key(root: &Path, dir: &Path) -> DocumentKey {
    let solution = root
        .file_name()
        .map_or_else(|| "workspace".to_string(), |n| n.to_string_lossy().into_owned());
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let file = if relative.as_os_str().is_empty() {
        format!("{solution}.rs")
    } else {
        format!("{}.rs", relative.display())
    };
    DocumentKey::new(solution, "history", file)
}

fn cmd_track(config: TrackerConfig, root: &Path, recursive: bool, json: bool, diff: bool) -> Result<()> {
    let store = Arc::new(MemorySnapshotStore::new());
    let mut documents = Vec::new();
    for dir in history_dirs(root, recursive)? {
        let key = document_key(root, &dir);
        load_history_dir(&store, &key, &dir)
            .with_context(|| format!("cannot load history from {}", dir.display()))?;
        documents.push(key);
    }

    let sink: Arc<dyn refactor_audit::NotificationSink> = if json {
        Arc::new(NullSink)
    } else {
        Arc::new(LoggingSink)
    };
    let provider: Arc<dyn SnapshotProvider> = store.clone();
    let ctx = TrackerContext::with_snapshot_workspace(provider, config, sink);

    let mut reports = Vec::new();
    for key in &documents {
        reports.push(ctx.detect_and_track(key)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let mut open = 0;
    for report in &reports {
        print_report(report);
        let issues = match ctx.code_issues_for_document(&report.document) {
            Ok(issues) => issues,
            Err(err) => {
                tracing::warn!(document = %report.document, %err, "no issues listed for document");
                Vec::new()
            }
        };
        let text = store
            .latest(&report.document)?
            .map(|s| s.text().to_string())
            .unwrap_or_default();
        for issue in &issues {
            open += 1;
            print_issue(issue, &text, diff);
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} document(s) tracked", documents.len());
    println!("  {} live issue computer(s)", format!("{}", ctx.live_issue_computers().len()).yellow());
    println!("  {} open issue(s)", format!("{open}").red());
    Ok(())
}

fn print_report(report: &TrackReport) {
    println!("\n{}", format!("{}", report.document).bold());
    println!(
        "  {}",
        format!(
            "{} comparison(s), {} unparsable snapshot(s) skipped",
            report.comparisons, report.skipped
        )
        .dimmed()
    );
    for found in &report.refactorings {
        println!(
            "  {} {} {}",
            format!("[{}]", found.kind).cyan(),
            format!("{} -> {}", found.before, found.after).dimmed(),
            found.summary
        );
    }
    for correct in &report.correct {
        println!("  {} {}", "✓".green(), correct.key);
    }
    for live in &report.live {
        println!("  {} {}", "✗".red(), live.message);
    }
}

fn print_issue(issue: &CodeIssue, text: &str, diff: bool) {
    println!(
        "  {} {} {}",
        "warning:".yellow().bold(),
        issue.message,
        format!("(bytes {}..{})", issue.span.start, issue.span.end).dimmed()
    );
    for action in &issue.actions {
        println!("    {} {}", "fix:".cyan(), action.title);
        if !diff {
            continue;
        }
        match TextEdit::apply_all(&action.edits_for(&issue.document), text) {
            Ok(fixed) => display_diff(&issue.document, text, &fixed),
            Err(err) => println!("      {}", format!("cannot preview: {err}").dimmed()),
        }
    }
}

/// Unified diff between the current text and the text after a fix.
fn display_diff(document: &DocumentKey, original: &str, modified: &str) {
    println!("{}", format!("--- {document} (current)").dimmed());
    println!("{}", format!("+++ {document} (fixed)").dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for change in diff.iter_all_changes() {
        let line = match change.tag() {
            ChangeTag::Delete => format!("-{change}").red(),
            ChangeTag::Insert => format!("+{change}").green(),
            ChangeTag::Equal => continue,
        };
        print!("      {line}");
    }
}

fn cmd_config(config: &TrackerConfig, source: Option<&Path>) -> Result<()> {
    match source {
        Some(path) => println!("{}", format!("# from {}", path.display()).dimmed()),
        None => println!("{}", "# built-in defaults".dimmed()),
    }
    println!("{}", config.to_json()?);
    Ok(())
}
