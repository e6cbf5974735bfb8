use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use shabaka::db::Database;
use shabaka::display::{format_result_set_as_json, format_result_set_as_text};
use shabaka::graph::ResultSet;
use shabaka::types::*;
use shabaka::word_graph::ArabicWordGraph;

/// Arabic word graph: roots, derived words and their translations.
#[derive(Parser)]
#[command(name = "shabaka", about = "Arabic word graph search")]
struct Cli {
    /// Project path (default: current directory)
    #[arg(short, long, global = true)]
    path: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new word graph project
    Init {
        /// Project path (default: current directory)
        dir: Option<String>,
    },
    /// Add a root
    AddRoot {
        label: String,
    },
    /// Add a verb derived from a root
    AddVerb {
        label: String,
        /// Verb stem, I to X
        #[arg(short, long)]
        stem: String,
        /// Id of the node the verb is derived from
        #[arg(short, long)]
        from: String,
    },
    /// Add a noun derived from another node
    AddNoun {
        label: String,
        #[arg(short, long)]
        from: String,
    },
    /// Add a particle derived from another node
    AddParticle {
        label: String,
        #[arg(short, long)]
        from: String,
    },
    /// Add a translation of a node
    AddForeign {
        label: String,
        /// Language code of the translation
        #[arg(short, long)]
        language: String,
        #[arg(short, long)]
        from: String,
    },
    /// Search Arabic words
    Search {
        query: String,
        /// Include the derivation subgraph around every hit
        #[arg(short, long)]
        expand: bool,
        /// Maximum direct hits (default: from config)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Fetch plan such as `*:2` (default: from config)
        #[arg(long)]
        fetch_plan: Option<String>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Search by translation
    Foreign {
        query: String,
        #[arg(short, long)]
        json: bool,
    },
    /// Show records by id
    Show {
        ids: Vec<String>,
        /// Include the derivation subgraph
        #[arg(short, long)]
        expand: bool,
        #[arg(short, long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> shabaka::errors::Result<()> {
    let project = cli.path;
    match cli.command {
        Commands::Init { dir } => {
            let project_path = resolve_path(dir.or(project));
            ArabicWordGraph::<Database>::init(&project_path)?;
            println!(
                "Initialized word graph at {}",
                ArabicWordGraph::<Database>::project_dir(&project_path).display()
            );
        }
        Commands::AddRoot { label } => {
            let graph = open(project)?;
            let id = graph.store().add_root_node(&label)?;
            println!("{}", id);
        }
        Commands::AddVerb { label, stem, from } => {
            let graph = open(project)?;
            let id = graph.store().add_verb_node(&label, &stem, from.parse()?)?;
            println!("{}", id);
        }
        Commands::AddNoun { label, from } => {
            let graph = open(project)?;
            let id = graph.store().add_noun_node(&label, from.parse()?)?;
            println!("{}", id);
        }
        Commands::AddParticle { label, from } => {
            let graph = open(project)?;
            let id = graph.store().add_particle_node(&label, from.parse()?)?;
            println!("{}", id);
        }
        Commands::AddForeign {
            label,
            language,
            from,
        } => {
            let graph = open(project)?;
            let id = graph
                .store()
                .add_foreign_node(&label, &language, from.parse()?)?;
            println!("{}", id);
        }
        Commands::Search {
            query,
            expand,
            limit,
            fetch_plan,
            json,
        } => {
            let graph = open(project)?;
            let limit = limit.unwrap_or(graph.config().default_limit);
            let fetch_plan = match fetch_plan {
                Some(spec) => FetchPlan::parse(&spec)?,
                None => graph.config().fetch_plan_for(expand)?,
            };
            let results = graph.search_arabic(&query, expand, limit, fetch_plan)?;
            print_results(&results, json)?;
        }
        Commands::Foreign { query, json } => {
            let graph = open(project)?;
            let results = graph.search_foreign(&query)?;
            print_results(&results, json)?;
        }
        Commands::Show { ids, expand, json } => {
            let graph = open(project)?;
            let ids = ids
                .iter()
                .map(|id| RecordId::parse(id))
                .collect::<shabaka::errors::Result<Vec<_>>>()?;
            let results = graph.get_nodes(&ids, expand)?;
            print_results(&results, json)?;
        }
    }
    Ok(())
}

fn open(path: Option<String>) -> shabaka::errors::Result<ArabicWordGraph<Database>> {
    ArabicWordGraph::<Database>::open(&resolve_path(path))
}

fn print_results(results: &ResultSet, json: bool) -> shabaka::errors::Result<()> {
    if json {
        println!("{}", format_result_set_as_json(results)?);
    } else {
        print!("{}", format_result_set_as_text(results));
    }
    Ok(())
}

/// Resolves an optional path argument to a `PathBuf`.
///
/// Defaults to the current working directory if no path is provided.
fn resolve_path(path: Option<String>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
