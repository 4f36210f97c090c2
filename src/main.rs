//! cheese-trace CLI: dairy provenance graph and compliance checks.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use cheese_trace::config::TraceConfig;
use cheese_trace::export::{self, DerivationExport, TripleExport};
use cheese_trace::graph::Triple;
use cheese_trace::graph::traverse::{LineageDirection, TraversalConfig, traverse_bfs};
use cheese_trace::listener::{ChangeNotification, LineSource, decode_notification};
use cheese_trace::pipeline::Pipeline;
use cheese_trace::term::{Literal, Term};
use cheese_trace::translate::Translator;
use cheese_trace::vocab::{self, Property};

#[derive(Parser)]
#[command(name = "cheese-trace", version, about = "Dairy batch provenance graph")]
struct Cli {
    /// TOML configuration file (defaults apply when absent).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest change notifications, materialize rules, run the checks.
    Run {
        /// JSON-lines notification file, or `-` for stdin.
        #[arg(long)]
        events: PathBuf,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,

        /// Write the final graph as N-Triples to this file.
        #[arg(long)]
        ntriples: Option<PathBuf>,

        /// List every derived triple with the facts it was derived from.
        #[arg(long)]
        derivations: bool,
    },

    /// Translate a single row (`{"lot_id": ..., "product_type": ..., "attrs": ...}`).
    Translate {
        /// Row as JSON text.
        #[arg(long)]
        row: String,
    },

    /// Show the lineage of one lot after ingesting and materializing.
    Lineage {
        /// JSON-lines notification file, or `-` for stdin.
        #[arg(long)]
        events: PathBuf,

        /// Lot id to start from.
        #[arg(long)]
        lot: String,

        /// Walk towards derived products instead of sources.
        #[arg(long)]
        downstream: bool,

        /// Maximum hop depth.
        #[arg(long, default_value = "8")]
        max_depth: usize,
    },

    /// Print the effective configuration as TOML.
    Config {
        /// Write it to this file instead of stdout.
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TraceConfig::load(path)?,
        None => TraceConfig::default(),
    };

    match cli.command {
        Commands::Run {
            events,
            json,
            ntriples,
            derivations,
        } => {
            let pipeline = Pipeline::new(config)?;
            let summary = pipeline.run(open_events(&events)?)?;

            if let Some(path) = ntriples {
                let file = File::create(&path).into_diagnostic()?;
                export::write_ntriples(pipeline.store(), BufWriter::new(file)).into_diagnostic()?;
                tracing::info!(path = %path.display(), "graph written");
            }

            if json {
                let out = serde_json::to_string_pretty(&summary).into_diagnostic()?;
                println!("{out}");
            } else {
                print!("{summary}");
            }

            if derivations {
                println!("\nDerivations ({}):", summary.derivations.len());
                for d in summary.derivations.iter().map(DerivationExport::from) {
                    println!(
                        "  [{}] {} {} {} (rule {})",
                        d.iteration, d.triple.subject, d.triple.predicate, d.triple.object, d.rule
                    );
                    for a in &d.antecedents {
                        println!("      <- {} {} {}", a.subject, a.predicate, a.object);
                    }
                }
            }
        }

        Commands::Translate { row } => {
            let data: serde_json::Value = serde_json::from_str(&row).into_diagnostic()?;
            let table = config.listener.source_table.clone();
            let payload = ChangeNotification { table, data }.to_payload();
            let Some(row) = decode_notification(&payload, &config.listener.source_table)? else {
                miette::bail!("row could not be decoded");
            };
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for triple in Translator::new().translate(&row) {
                writeln!(out, "{triple}").into_diagnostic()?;
            }
        }

        Commands::Lineage {
            events,
            lot,
            downstream,
            max_depth,
        } => {
            let pipeline = Pipeline::new(config)?;
            pipeline.ingest(open_events(&events)?)?;
            pipeline.materialize();
            let store = pipeline.store();

            let direction = if downstream {
                LineageDirection::Downstream
            } else {
                LineageDirection::Upstream
            };
            let traversal = TraversalConfig {
                max_depth,
                ..TraversalConfig::lineage(direction)
            };
            let result = traverse_bfs(store, &Term::Iri(vocab::lot_iri(&lot)), &traversal);

            println!(
                "Lineage of {lot} ({}, depth {}):",
                if downstream { "downstream" } else { "upstream" },
                result.depth_reached
            );
            if result.triples.is_empty() {
                println!("  (no lineage edges)");
            }
            for triple in &result.triples {
                let t = TripleExport::from(triple);
                println!("  {} {} {}", t.subject, t.predicate, t.object);
            }

            let quarantined: Vec<String> = result
                .visited
                .iter()
                .filter(|term| {
                    store.contains(&Triple::new(
                        (*term).clone(),
                        Property::RequiresQuarantine.iri(),
                        Literal::Boolean(true),
                    ))
                })
                .map(vocab::display_id)
                .collect();
            if !quarantined.is_empty() {
                println!("Quarantined: {}", quarantined.join(", "));
            }
        }

        Commands::Config { write } => match write {
            Some(path) => {
                config.save(&path)?;
                println!("Configuration written to {}", path.display());
            }
            None => print!("{}", config.to_toml()?),
        },
    }

    Ok(())
}

/// JSON-lines notification source over a file, or stdin for `-`.
fn open_events(path: &Path) -> Result<LineSource<Box<dyn BufRead>>> {
    let reader: Box<dyn BufRead> = if path == Path::new("-") {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(File::open(path).into_diagnostic()?))
    };
    Ok(LineSource::new(reader))
}
