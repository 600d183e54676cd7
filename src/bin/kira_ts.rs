use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kira_taxseq::config::ConfigLoader;
use kira_taxseq::domain::{BatchResult, LengthRange, MAX_RECORDS_CEILING, TaxonInput};
use kira_taxseq::entrez::EntrezHttpClient;
use kira_taxseq::error::KiraError;
use kira_taxseq::output::{JsonOutput, OutputFormat, StderrProgress, TsvOutput};
use kira_taxseq::pipeline::{Pipeline, RunOptions};

#[derive(Parser)]
#[command(name = "kira-ts")]
#[command(about = "Retrieve NCBI nucleotide record summaries per taxon")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search sequence records for one or more taxa")]
    Search(SearchArgs),
}

#[derive(Args)]
struct SearchArgs {
    #[arg(long = "name", conflicts_with = "ids", help = "Taxon name (repeatable)")]
    names: Vec<String>,

    #[arg(long = "id", help = "NCBI taxonomy id (repeatable)")]
    ids: Vec<String>,

    #[arg(long, help = "Sequence length range MIN:MAX [default: 1:3000]")]
    seq_range: Option<LengthRange>,

    #[arg(long, help = "Retry with a parent taxon when nothing is found")]
    get_related: bool,

    #[arg(long, help = "Maximum records per taxon [default: 500]")]
    limit: Option<usize>,

    #[arg(long, help = "Extra Entrez query, ANDed with the taxon and length filters")]
    filter: Option<String>,

    #[arg(long, help = "Keep predicted (XM_/XR_) records")]
    hypothetical: bool,

    #[arg(long, short)]
    verbose: bool,

    #[arg(long, help = "Taxa processed in parallel")]
    workers: Option<usize>,

    #[arg(long, value_enum, default_value = "tsv")]
    format: OutputFormat,

    #[arg(long, short)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::InvalidTaxonInput(_)
        | KiraError::InvalidTaxonomyId(_)
        | KiraError::InvalidLengthRange(_)
        | KiraError::UnresolvedTaxon(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_) => 2,
        KiraError::EntrezHttp(_)
        | KiraError::EntrezStatus { .. }
        | KiraError::EntrezQuery(_)
        | KiraError::MalformedResponse(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Search(args) => run_search(args, cli.config.as_deref()),
    }
}

fn run_search(args: SearchArgs, config_path: Option<&str>) -> miette::Result<()> {
    let inputs = TaxonInput::from_args(&args.names, &args.ids)?;
    let config = ConfigLoader::resolve(config_path)?;

    let mut constraints = config.defaults.constraints();
    if let Some(seq_range) = args.seq_range {
        constraints.seq_range = seq_range;
    }
    if let Some(limit) = args.limit {
        constraints.max_records = limit;
    }
    if args.filter.is_some() {
        constraints.filter = args.filter;
    }
    constraints.keep_hypothetical |= args.hypothetical;
    if constraints.max_records > MAX_RECORDS_CEILING {
        tracing::warn!(
            limit = constraints.max_records,
            "NCBI returns at most {MAX_RECORDS_CEILING} ids per search"
        );
    }

    let options = RunOptions {
        get_related: args.get_related || config.defaults.get_related,
        verbose: args.verbose,
        workers: args.workers.unwrap_or(config.defaults.workers).max(1),
    };

    let client = EntrezHttpClient::new(config.entrez)?;
    let pipeline = Pipeline::new(client.clone(), client, constraints);
    let batch = pipeline.run(&inputs, &options, &StderrProgress)?;

    for (label, err) in batch.failures() {
        eprintln!("no result for {label}: {err}");
    }

    match &args.output {
        Some(path) => {
            let file = File::create(path.as_std_path())
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            write_batch(&batch, args.format, BufWriter::new(file))
        }
        None => write_batch(&batch, args.format, io::stdout().lock()),
    }
}

fn write_batch<W: Write>(batch: &BatchResult, format: OutputFormat, writer: W) -> miette::Result<()> {
    match format {
        OutputFormat::Json => JsonOutput::write(batch, writer)?,
        OutputFormat::Tsv => TsvOutput::write(batch, writer)?,
    }
    Ok(())
}
