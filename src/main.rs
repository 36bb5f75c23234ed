use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use topsig::{TopsigConfig, TrecWriter};

#[derive(Parser, Debug)]
#[command(name = "topsig", version, about = "Binary signature indexing and search")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// YAML run configuration
    #[arg(short, long, global = true, default_value = "topsig.yaml")]
    config: PathBuf,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index the configured targets into a signature file
    Index,

    /// Build the ISSL index of the signature file
    Issl,

    /// Search the signature file for one text query
    Search {
        /// Query text
        text: String,

        /// Topic id used in the output
        #[arg(long, default_value = "query")]
        id: String,
    },

    /// Run the topic file
    Topic(OutputArgs),

    /// Use stored documents as queries against the ISSL index
    IsslSearch(OutputArgs),

    /// Rerank an existing run file
    Rerank(OutputArgs),
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Results file; overrides `paths.results`
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(BufWriter::new(File::create(p)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.common.json);

    let cfg = TopsigConfig::from_file(&cli.common.config)?;
    let output = |args: &OutputArgs| {
        let path = args.output.as_deref().or(cfg.paths.results.as_deref());
        open_output(path)
    };

    match &cli.command {
        Commands::Index => {
            let stats = topsig::index_collection(&cfg)?;
            eprintln!(
                "indexed {} documents into {} signatures",
                stats.documents, stats.signatures
            );
        }
        Commands::Issl => {
            let index = topsig::build_issl(&cfg)?;
            eprintln!("issl index over {} records", index.records());
        }
        Commands::Search { text, id } => {
            let results = topsig::search_text(&cfg, id, text)?;
            let mut out = TrecWriter::new(io::stdout().lock(), cfg.topic.run_id.as_str());
            out.write_results(id, &results)?;
            out.finish()?;
        }
        Commands::Topic(args) => {
            let n = topsig::run_topics(&cfg, output(args)?)?;
            eprintln!("{n} topics run");
        }
        Commands::IsslSearch(args) => {
            let n = topsig::run_issl_search(&cfg, output(args)?)?;
            eprintln!("{n} document queries run");
        }
        Commands::Rerank(args) => {
            let n = topsig::run_rerank(&cfg, output(args)?)?;
            eprintln!("{n} topics reranked");
        }
    }

    Ok(())
}
