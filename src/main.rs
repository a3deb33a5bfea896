use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tandem_core::{ClusterStrategy, ClusteringConfig, OutputFormat, ScoringMethod, TandemConfig};
use tandem_pulse::cluster::Partition;
use tandem_pulse::commits::{self, CommitEvent};
use tandem_pulse::coupling::{CouplingTable, COLUMNS};
use tandem_pulse::matrix::SupportMatrix;
use tandem_pulse::mining::{self, MiningOptions};
use tandem_pulse::timeline::{self, MonthlySnapshot};
use tandem_pulse::NeighborhoodClusterer;

#[derive(Parser)]
#[command(
    name = "tandem",
    version,
    about = "Find components that change together",
    long_about = "Tandem measures temporal coupling between components from their commit history.\n\n\
                   Commits are grouped into bursts of activity; components that keep landing in\n\
                   the same bursts are coupled, scored with Jaccard or Sørensen–Dice.\n\n\
                   Examples:\n  \
                     tandem mine --path repos --output commits.json   Mine one repo per component\n  \
                     tandem couple --commits commits.json             Score every component pair\n  \
                     tandem couple --repos repos --component billing  Pairs involving one component\n  \
                     tandem timeline --commits commits.json           Cumulative coupling per month\n  \
                     tandem init                                      Write a default .tandem.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .tandem.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables and summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Mine component repositories into a commit event file
    #[command(long_about = "Mine component repositories into a commit event file.\n\n\
        Every immediate subdirectory of --path that is a git repository is treated as\n\
        one component. Each commit becomes one event with its author time and line counts.\n\n\
        Examples:\n  tandem mine --path repos --output commits.json\n  tandem mine --path repos --branch main")]
    Mine {
        /// Directory holding one git repository per component
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Write events to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Branch to walk in every repository (default: HEAD)
        #[arg(long)]
        branch: Option<String>,

        /// Keep merge commits
        #[arg(long)]
        include_merges: bool,
    },
    /// Group commits into bursts of activity
    #[command(long_about = "Group commits into bursts of activity.\n\n\
        Runs the configured clusterer and prints each cluster with its time range and\n\
        the components it touches.\n\n\
        Examples:\n  tandem cluster --commits commits.json --eps 2h\n  tandem cluster --repos repos --strategy density --bandwidth 30m")]
    Cluster {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        clustering: ClusteringArgs,

        /// Maximum clusters to show (0 for all)
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Score temporal coupling between components
    #[command(long_about = "Score temporal coupling between components.\n\n\
        Scores every pair of components (or every pair involving --component) by how\n\
        often they share a cluster. Normalized support divides the shared-cluster count\n\
        by its 99th percentile across all pairs.\n\n\
        Examples:\n  tandem couple --commits commits.json\n  tandem couple --commits commits.json --method sorensen --matrix\n  tandem couple --repos repos --component billing --before 2024-06-01")]
    Couple {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        clustering: ClusteringArgs,

        /// Only report pairs involving this component
        #[arg(long)]
        component: Option<String>,

        /// Scoring method: jaccard or sorensen (default from config)
        #[arg(long)]
        method: Option<String>,

        /// Maximum pairs to show, 0 for all (default from config)
        #[arg(long)]
        limit: Option<usize>,

        /// Also print the score × support matrix
        #[arg(long)]
        matrix: bool,
    },
    /// Show cumulative coupling month by month
    #[command(long_about = "Show cumulative coupling month by month.\n\n\
        Clusters accumulate from the first month with commits; after each calendar month\n\
        all pairs are scored over everything seen so far.\n\n\
        The timeline always uses the neighborhood clusterer; [clustering] strategy is\n\
        ignored. Its minimum cluster size comes from [timeline] min_size (default 2),\n\
        so isolated commits are noise unless --min-size 1 is given.\n\n\
        Examples:\n  tandem timeline --commits commits.json\n  tandem timeline --repos repos --eps 1h --format json")]
    Timeline {
        #[command(flatten)]
        input: InputArgs,

        /// Neighborhood radius, e.g. 30m or 4h (default from config)
        #[arg(long)]
        eps: Option<String>,

        /// Minimum cluster size (default from [timeline] in config)
        #[arg(long)]
        min_size: Option<usize>,

        /// Scoring method: jaccard or sorensen (default from config)
        #[arg(long)]
        method: Option<String>,

        /// Pairs to keep per month, 0 for all (default from config)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Create a default .tandem.toml configuration file
    #[command(long_about = "Create a default .tandem.toml configuration file.\n\n\
        Fails if .tandem.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Commit event file written by `tandem mine`
    #[arg(long, conflicts_with = "repos")]
    commits: Option<PathBuf>,

    /// Directory of component repositories to mine on the fly
    #[arg(long)]
    repos: Option<PathBuf>,

    /// Only use commits up to this date (YYYY-MM-DD, UTC midnight, inclusive)
    #[arg(long)]
    before: Option<NaiveDate>,
}

#[derive(Args)]
struct ClusteringArgs {
    /// Clusterer: neighborhood or density (default from config)
    #[arg(long)]
    strategy: Option<ClusterStrategy>,

    /// Neighborhood radius, e.g. 30m or 4h (default from config)
    #[arg(long)]
    eps: Option<String>,

    /// Minimum cluster size; smaller bursts become noise (default from config)
    #[arg(long)]
    min_size: Option<usize>,

    /// Density kernel bandwidth, e.g. 1h (default from config)
    #[arg(long)]
    bandwidth: Option<String>,
}

impl ClusteringArgs {
    /// Overlay the flags that were given on top of the configured values.
    fn resolve(&self, base: &ClusteringConfig) -> ClusteringConfig {
        let mut config = base.clone();
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(ref eps) = self.eps {
            config.eps = eps.clone();
        }
        if let Some(min_size) = self.min_size {
            config.min_size = min_size;
        }
        if let Some(ref bandwidth) = self.bandwidth {
            config.bandwidth = bandwidth.clone();
        }
        config
    }
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// One cluster as printed by `tandem cluster`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterSummary {
    start: i64,
    end: i64,
    commits: usize,
    components: Vec<String>,
}

fn summarize(partition: &Partition<'_>) -> Vec<ClusterSummary> {
    partition
        .clusters
        .iter()
        .map(|cluster| {
            let mut components: Vec<String> =
                cluster.events.iter().map(|e| e.component.clone()).collect();
            components.sort();
            components.dedup();
            ClusterSummary {
                start: cluster.start(),
                end: cluster.end(),
                commits: cluster.len(),
                components,
            }
        })
        .collect()
}

fn init_tracing(verbose: bool) {
    if !verbose && std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let mut filter = EnvFilter::from_default_env();
    if verbose {
        filter = filter.add_directive(tracing::Level::DEBUG.into());
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mtandem\x1b[0m v{version}: temporal coupling from commit history\n");
    } else {
        println!("tandem v{version}: temporal coupling from commit history\n");
    }
    println!("Quick start:");
    println!("  tandem init                                     Create a .tandem.toml config file");
    println!("  tandem mine --path repos --output commits.json  Mine one repo per component");
    println!("  tandem couple --commits commits.json            Score component pairs");
    println!("  tandem timeline --commits commits.json          Coupling month by month");
    println!("\nRun 'tandem --help' for all commands.");
}

fn format_time(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn mining_options(config: &TandemConfig, branch: Option<String>, include_merges: bool) -> MiningOptions {
    MiningOptions {
        include_merges: include_merges || config.history.include_merges,
        branch: branch.or_else(|| config.history.branch.clone()),
    }
}

fn mine_with_progress(root: &Path, options: &MiningOptions) -> Result<Vec<CommitEvent>> {
    if !root.is_dir() {
        miette::bail!(miette::miette!(
            help = "Point --repos or --path at a directory containing one git repository per component",
            "Not a directory: {}",
            root.display()
        ));
    }

    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                .into_diagnostic()?,
        );
        pb.set_message(format!("Mining repositories under {} ...", root.display()));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        eprintln!("Mining repositories under {} ...", root.display());
        None
    };

    let result = mining::mine_components(root, options);
    if let Some(pb) = &spinner {
        match &result {
            Ok(events) => pb.finish_with_message(format!("Mined {} commits", events.len())),
            Err(_) => pb.finish_with_message("Failed"),
        }
    } else if let Ok(events) = &result {
        eprintln!("Mined {} commits.", events.len());
    }
    Ok(result?)
}

fn load_events(input: &InputArgs, config: &TandemConfig) -> Result<Vec<CommitEvent>> {
    let events = match (&input.commits, &input.repos) {
        (Some(path), _) => {
            let events = commits::load_commits(path)?;
            eprintln!("Loaded {} commits from {}.", events.len(), path.display());
            events
        }
        (None, Some(root)) => mine_with_progress(root, &mining_options(config, None, false))?,
        (None, None) => miette::bail!(miette::miette!(
            help = "Pass --commits <file> (from `tandem mine`) or --repos <dir>",
            "No commit input given"
        )),
    };

    let Some(day) = input.before else {
        return Ok(events);
    };
    let Some(midnight) = day.and_hms_opt(0, 0, 0) else {
        miette::bail!("invalid --before date: {day}");
    };
    let window = commits::commits_before(&events, midnight.and_utc().timestamp()).to_vec();
    eprintln!("Using {} of {} commits up to {day}.", window.len(), events.len());
    Ok(window)
}

fn resolve_method(flag: Option<&str>, config: &TandemConfig) -> Result<ScoringMethod> {
    Ok(flag.unwrap_or(&config.coupling.method).parse::<ScoringMethod>()?)
}

fn print_table_text(table: &CouplingTable, use_color: bool) {
    if table.is_empty() {
        println!("  No component pairs to score.");
        return;
    }
    for record in &table.records {
        let pair = format!("{} <-> {}", record.component_x, record.component_y);
        let pair = if use_color && record.normalized_support > 1.0 {
            format!("\x1b[1m{pair}\x1b[0m")
        } else {
            pair
        };
        println!(
            "  {pair}  score={:.2}  support={:.2}  shared={}/{}  active {}",
            record.score,
            record.normalized_support,
            record.intersection_size,
            record.union_size,
            record.active_period,
        );
    }
}

fn print_table_markdown(table: &CouplingTable) {
    if table.is_empty() {
        println!("No component pairs to score.\n");
        return;
    }
    println!("| {} |", COLUMNS.join(" | "));
    println!("|{}", "---|".repeat(COLUMNS.len()));
    for r in &table.records {
        println!(
            "| `{}` | `{}` | {} | {} | {} | {} | {:.3} | {:.3} | {} |",
            r.component_x,
            r.component_y,
            r.size_x,
            r.size_y,
            r.intersection_size,
            r.union_size,
            r.score,
            r.normalized_support,
            r.active_period,
        );
    }
    println!();
}

fn print_matrix(matrix: &SupportMatrix, format: OutputFormat) {
    match format {
        OutputFormat::Markdown => {
            println!("## Score × Support\n");
            println!("| score \\ support | {} |", matrix.support_bins.join(" | "));
            println!("|{}", "---|".repeat(matrix.support_bins.len() + 1));
            for (label, row) in matrix.score_bins.iter().zip(&matrix.counts) {
                let cells: Vec<String> = row.iter().map(usize::to_string).collect();
                println!("| {label} | {} |", cells.join(" | "));
            }
            println!();
        }
        _ => {
            println!("Score × Support:");
            println!("{:-<72}", "");
            print!("  {:<12}", "score");
            for label in &matrix.support_bins {
                print!("{label:>12}");
            }
            println!();
            for (label, row) in matrix.score_bins.iter().zip(&matrix.counts) {
                print!("  {label:<12}");
                for count in row {
                    print!("{count:>12}");
                }
                println!();
            }
            println!();
        }
    }
}

fn print_timeline(snapshots: &[MonthlySnapshot], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(snapshots).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Cumulative Coupling\n");
            println!("| Month | Clusters | Pairs | Top pair | Score |");
            println!("|-------|----------|-------|----------|-------|");
            for s in snapshots {
                match s.table.records.first() {
                    Some(top) => println!(
                        "| {} | {} | {} | `{}` / `{}` | {:.3} |",
                        s.month,
                        s.clusters,
                        s.table.len(),
                        top.component_x,
                        top.component_y,
                        top.score
                    ),
                    None => println!("| {} | {} | 0 | - | - |", s.month, s.clusters),
                }
            }
        }
        OutputFormat::Text => {
            println!("Cumulative coupling by month:");
            println!("{:-<72}", "");
            for s in snapshots {
                match s.table.records.first() {
                    Some(top) => println!(
                        "  {}  clusters={:<5} top: {} <-> {} ({:.2})",
                        s.month, s.clusters, top.component_x, top.component_y, top.score
                    ),
                    None => println!("  {}  clusters={:<5} no pairs yet", s.month, s.clusters),
                }
            }
        }
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Tandem Configuration
# CLI flags override these values.

[clustering]
# neighborhood: link commits closer than eps; density: cut at KDE valleys
strategy = "neighborhood"
eps = "4h"
# 1 keeps isolated commits as their own clusters, 2 drops them as noise
min_size = 1
bandwidth = "1h"
granularity = 1000

[coupling]
# jaccard or sorensen
method = "jaccard"
limit = 20

[history]
include_merges = false
# branch = "main"

[timeline]
# monthly snapshots drop isolated commits as noise by default
min_size = 2
"#;

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => TandemConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".tandem.toml");
            if default_path.exists() {
                TandemConfig::from_file(default_path)?
            } else {
                TandemConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    if cli.verbose {
        eprintln!("format: {}", cli.format);
        eprintln!(
            "clustering: {} (eps={}, min_size={}, bandwidth={})",
            config.clustering.strategy,
            config.clustering.eps,
            config.clustering.min_size,
            config.clustering.bandwidth
        );
    }

    let Some(command) = cli.command else {
        print_welcome(use_color);
        return Ok(());
    };

    match command {
        Command::Mine {
            path,
            output,
            branch,
            include_merges,
        } => {
            let options = mining_options(&config, branch, include_merges);
            let events = mine_with_progress(&path, &options)?;
            match output {
                Some(file) => {
                    commits::save_commits(&file, &events)?;
                    eprintln!("Wrote {} commits to {}", events.len(), file.display());
                }
                None => {
                    println!("{}", serde_json::to_string_pretty(&events).into_diagnostic()?);
                }
            }
        }
        Command::Cluster {
            input,
            clustering,
            limit,
        } => {
            let events = load_events(&input, &config)?;
            let clustering = clustering.resolve(&config.clustering);
            let partition = tandem_pulse::analysis::cluster(&events, &clustering)?;
            let summaries = summarize(&partition);
            let shown = if limit == 0 { summaries.len() } else { limit };

            match cli.format {
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "strategy": clustering.strategy,
                        "commits": events.len(),
                        "noise": partition.noise.len(),
                        "clusters": summaries,
                    });
                    println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("# Clusters\n");
                    println!(
                        "**Strategy:** {} | **Commits:** {} | **Clusters:** {} | **Noise:** {}\n",
                        clustering.strategy,
                        events.len(),
                        summaries.len(),
                        partition.noise.len()
                    );
                    println!("| # | Start | End | Commits | Components |");
                    println!("|---|-------|-----|---------|------------|");
                    for (i, c) in summaries.iter().take(shown).enumerate() {
                        println!(
                            "| {} | {} | {} | {} | {} |",
                            i + 1,
                            format_time(c.start),
                            format_time(c.end),
                            c.commits,
                            c.components.join(", ")
                        );
                    }
                }
                OutputFormat::Text => {
                    println!(
                        "{} clusters, {} noise commits ({}):",
                        summaries.len(),
                        partition.noise.len(),
                        clustering.strategy
                    );
                    println!("{:-<72}", "");
                    for (i, c) in summaries.iter().take(shown).enumerate() {
                        println!(
                            "{:>3}. {} to {}  commits={:<4} {}",
                            i + 1,
                            format_time(c.start),
                            format_time(c.end),
                            c.commits,
                            c.components.join(", ")
                        );
                    }
                }
            }
        }
        Command::Couple {
            input,
            clustering,
            component,
            method,
            limit,
            matrix,
        } => {
            let events = load_events(&input, &config)?;
            let clustering = clustering.resolve(&config.clustering);
            let method = resolve_method(method.as_deref(), &config)?;
            let limit = limit.unwrap_or(config.coupling.limit);

            let mut report =
                tandem_pulse::analyze(&events, &clustering, method, component.as_deref())?;
            report.table.sort_by_score();
            let matrix = matrix.then(|| SupportMatrix::from_table(&report.table));
            let total_pairs = report.table.len();
            if limit > 0 {
                report.table.truncate(limit);
            }

            let stats = &report.stats;
            eprintln!(
                "Analyzed {} commits: {} clusters, {} noise, {} components in {} ms.",
                stats.commits, stats.clusters, stats.noise, stats.components, stats.elapsed_ms
            );
            if let Some(per_day) = stats.clusters_per_day {
                eprintln!("Clusters per active day: {per_day:.2}");
            }

            match cli.format {
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "stats": report.stats,
                        "table": report.table,
                        "matrix": matrix,
                    });
                    println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("# Temporal Coupling\n");
                    println!(
                        "**Method:** {} | **Pairs:** {} | **Clusters:** {}\n",
                        method, total_pairs, report.stats.clusters
                    );
                    print_table_markdown(&report.table);
                    if let Some(ref m) = matrix {
                        print_matrix(m, cli.format);
                    }
                }
                OutputFormat::Text => {
                    println!(
                        "Temporal coupling ({method}, {} of {total_pairs} pairs):",
                        report.table.len()
                    );
                    println!("{:-<72}", "");
                    print_table_text(&report.table, use_color);
                    println!();
                    if let Some(ref m) = matrix {
                        print_matrix(m, cli.format);
                    }
                }
            }
        }
        Command::Timeline {
            input,
            eps,
            min_size,
            method,
            limit,
        } => {
            if config.clustering.strategy == ClusterStrategy::Density {
                tracing::warn!("timeline ignores the density strategy");
                eprintln!("Note: timeline always uses the neighborhood clusterer.");
            }
            let events = load_events(&input, &config)?;
            let clusterer = NeighborhoodClusterer::new(
                eps.as_deref().unwrap_or(&config.clustering.eps),
                min_size.unwrap_or(config.timeline.min_size),
            )?;
            let method = resolve_method(method.as_deref(), &config)?;
            let limit = limit.unwrap_or(config.coupling.limit);

            let mut snapshots = timeline::cumulative_coupling(&events, &clusterer, method);
            for snapshot in &mut snapshots {
                snapshot.table.sort_by_score();
                if limit > 0 {
                    snapshot.table.truncate(limit);
                }
            }
            eprintln!("Built {} monthly snapshots.", snapshots.len());
            print_timeline(&snapshots, cli.format)?;
        }
        Command::Init => {
            let path = Path::new(".tandem.toml");
            if path.exists() {
                miette::bail!(".tandem.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .tandem.toml with default configuration");
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "tandem", &mut std::io::stdout());
        }
    }

    Ok(())
}
