//! # Delay Analytics Main Driver
//!
//! ## Purpose
//! Command-line entry point wiring configuration to the cluster and corpus
//! components: bulk ingestion, filtered delay queries, carrier aggregations,
//! and the embedded corpus subcommands.
//!
//! ## Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging
//! 3. Dispatch the selected subcommand
//! 4. Report a categorized error and exit nonzero on failure

use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use skysearch::cluster::{aggregate, query, BulkIngestor, ClusterClient, TermsAggregation};
use skysearch::config::Config;
use skysearch::corpus::{
    search as corpus_search, similar, stats, CorpusDocument, CorpusIndex, SimilarityOptions,
    StopwordPolicy,
};
use skysearch::errors::{Result, SearchError};

/// Corpus manifest: the documents to index, with their source files
#[derive(Debug, Deserialize)]
struct CorpusManifest {
    #[serde(rename = "document")]
    documents: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    title: String,
    author: String,
    path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .expect("config has a default");
    let mut config = Config::from_file(config_path)?;
    apply_cli_overrides(&mut config, &matches);

    init_logging(&config);

    let outcome = dispatch(&config, &matches).await;
    if let Err(ref err) = outcome {
        error!("run failed ({}): {}", err.category(), err);
    }
    outcome
}

fn build_cli() -> Command {
    let collection_arg = Arg::new("collection")
        .long("collection")
        .value_name("NAME")
        .help("Target collection on the cluster")
        .default_value("airlines");
    let index_dir_arg = Arg::new("index-dir")
        .long("index-dir")
        .value_name("DIR")
        .help("Corpus index directory (defaults to the configured one)");
    let limit_arg = Arg::new("limit")
        .long("limit")
        .value_name("N")
        .value_parser(clap::value_parser!(usize))
        .default_value("10")
        .help("Maximum results to print");

    Command::new("skysearch")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Flight Analytics Team")
        .about("Search-driven airline delay analytics with an embedded corpus index")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("skysearch.toml"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("ingest")
                .about("Bulk-ingest an NDJSON file into the cluster")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .value_name("FILE")
                        .required(true)
                        .help("NDJSON input file, one document per line"),
                )
                .arg(collection_arg.clone())
                .arg(
                    Arg::new("batch-size")
                        .long("batch-size")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize))
                        .help("Documents per bulk request"),
                )
                .arg(
                    Arg::new("id-field")
                        .long("id-field")
                        .value_name("PATH")
                        .help("Dotted document field used as the item id"),
                )
                .arg(
                    Arg::new("keep-existing")
                        .long("keep-existing")
                        .action(ArgAction::SetTrue)
                        .help("Do not reset the collection before ingesting"),
                ),
        )
        .subcommand(
            Command::new("delays")
                .about("Records with many delayed flights and no security delays")
                .arg(collection_arg.clone())
                .arg(
                    Arg::new("min-delayed")
                        .long("min-delayed")
                        .value_name("N")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("2500")
                        .help("Minimum number of delayed flights"),
                )
                .arg(
                    Arg::new("max-hits")
                        .long("max-hits")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("25")
                        .help("Maximum records to print"),
                ),
        )
        .subcommand(
            Command::new("top-carriers")
                .about("Carriers ranked by their total delayed flights")
                .arg(collection_arg)
                .arg(
                    Arg::new("top")
                        .long("top")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5")
                        .help("Number of carriers to rank"),
                ),
        )
        .subcommand(
            Command::new("corpus-index")
                .about("Index a corpus of text documents from a manifest")
                .arg(
                    Arg::new("manifest")
                        .long("manifest")
                        .value_name("FILE")
                        .required(true)
                        .help("TOML manifest listing title, author, and path per document"),
                )
                .arg(index_dir_arg.clone())
                .arg(
                    Arg::new("keep-stopwords")
                        .long("keep-stopwords")
                        .action(ArgAction::SetTrue)
                        .help("Index without stop-word removal"),
                ),
        )
        .subcommand(
            Command::new("corpus-search")
                .about("Free-text query over the corpus")
                .arg(Arg::new("query").value_name("QUERY").required(true))
                .arg(index_dir_arg.clone())
                .arg(limit_arg.clone()),
        )
        .subcommand(
            Command::new("corpus-all")
                .about("Documents containing every given word")
                .arg(
                    Arg::new("words")
                        .value_name("WORD")
                        .required(true)
                        .num_args(1..),
                )
                .arg(index_dir_arg.clone())
                .arg(limit_arg.clone()),
        )
        .subcommand(
            Command::new("corpus-phrase")
                .about("Documents matching a phrase within a slop window")
                .arg(Arg::new("phrase").value_name("PHRASE").required(true))
                .arg(
                    Arg::new("slop")
                        .long("slop")
                        .value_name("N")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("0")
                        .help("Allowed positional distance between phrase terms"),
                )
                .arg(index_dir_arg.clone())
                .arg(limit_arg.clone()),
        )
        .subcommand(
            Command::new("corpus-terms")
                .about("Most frequent content terms")
                .arg(index_dir_arg.clone())
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("20")
                        .help("Number of terms to print"),
                ),
        )
        .subcommand(
            Command::new("corpus-similar")
                .about("Documents most similar to the given one")
                .arg(Arg::new("title").value_name("TITLE").required(true))
                .arg(index_dir_arg.clone())
                .arg(limit_arg),
        )
        .subcommand(
            Command::new("corpus-rebuild")
                .about("Re-index the corpus under the opposite stop-word policy")
                .arg(index_dir_arg)
                .arg(
                    Arg::new("target")
                        .long("target")
                        .value_name("DIR")
                        .required(true)
                        .help("Directory for the rebuilt index"),
                ),
        )
}

fn apply_cli_overrides(config: &mut Config, matches: &ArgMatches) {
    if let Some(("ingest", sub)) = matches.subcommand() {
        if let Some(batch_size) = sub.get_one::<usize>("batch-size") {
            config.ingest.batch_size = *batch_size;
        }
        if let Some(id_field) = sub.get_one::<String>("id-field") {
            config.ingest.id_field = Some(id_field.clone());
        }
        if sub.get_flag("keep-existing") {
            config.ingest.recreate_collection = false;
        }
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn dispatch(config: &Config, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("ingest", sub)) => run_ingest(config, sub).await,
        Some(("delays", sub)) => run_delays(config, sub).await,
        Some(("top-carriers", sub)) => run_top_carriers(config, sub).await,
        Some(("corpus-index", sub)) => run_corpus_index(config, sub),
        Some(("corpus-search", sub)) => run_corpus_search(config, sub),
        Some(("corpus-all", sub)) => run_corpus_all(config, sub),
        Some(("corpus-phrase", sub)) => run_corpus_phrase(config, sub),
        Some(("corpus-terms", sub)) => run_corpus_terms(config, sub),
        Some(("corpus-similar", sub)) => run_corpus_similar(config, sub),
        Some(("corpus-rebuild", sub)) => run_corpus_rebuild(config, sub),
        _ => unreachable!("subcommand is required"),
    }
}

async fn run_ingest(config: &Config, sub: &ArgMatches) -> Result<()> {
    let input = sub.get_one::<String>("input").expect("required");
    let collection = sub.get_one::<String>("collection").expect("defaulted");

    let client = ClusterClient::new(&config.cluster)?;
    let ingestor = BulkIngestor::new(&client, collection.clone(), &config.ingest);
    let report = ingestor.run_file(Path::new(input)).await?;

    let visible = client.count(collection).await?;
    info!(
        "collection {} now holds {} visible documents",
        collection, visible
    );
    println!(
        "Finished writing flight data. Documents processed: {}",
        report.documents
    );
    Ok(())
}

async fn run_delays(config: &Config, sub: &ArgMatches) -> Result<()> {
    let collection = sub.get_one::<String>("collection").expect("defaulted");
    let min_delayed = *sub.get_one::<f64>("min-delayed").expect("defaulted");
    let max_hits = *sub.get_one::<usize>("max-hits").expect("defaulted");

    let client = ClusterClient::new(&config.cluster)?;
    let filtered =
        query::FilteredQuery::delayed_without_security(collection.clone(), min_delayed, max_hits);
    let hits = query::run(&client, &filtered).await?;

    println!(
        "Query (>={} delayed flights AND 0 security delays) results: {}",
        min_delayed,
        hits.len()
    );
    for hit in hits {
        println!("{}", hit);
    }
    Ok(())
}

async fn run_top_carriers(config: &Config, sub: &ArgMatches) -> Result<()> {
    let collection = sub.get_one::<String>("collection").expect("defaulted");
    let top = *sub.get_one::<usize>("top").expect("defaulted");

    let client = ClusterClient::new(&config.cluster)?;
    let aggregation = TermsAggregation::carrier_delay_totals(collection.clone(), top);
    let (field, buckets) = aggregate::run(&client, &aggregation).await?;

    info!("aggregated on grouping field {}", field);
    println!("Top {} carriers by total delayed flights:", top);
    for bucket in buckets {
        println!(" - {} -> {}", bucket.key, bucket.total.round() as i64);
    }
    Ok(())
}

fn run_corpus_index(config: &Config, sub: &ArgMatches) -> Result<()> {
    let manifest_path = sub.get_one::<String>("manifest").expect("required");
    let policy = if sub.get_flag("keep-stopwords") {
        StopwordPolicy::Keep
    } else {
        StopwordPolicy::Remove
    };

    let raw = std::fs::read_to_string(manifest_path).map_err(|e| SearchError::InputResource {
        path: PathBuf::from(manifest_path),
        source: e,
    })?;
    let manifest: CorpusManifest = toml::from_str(&raw)?;

    let index_dir = corpus_dir(config, sub);
    let index = CorpusIndex::create_in_dir(&index_dir, policy, config.corpus.writer_heap_bytes)?;
    for entry in &manifest.documents {
        let document = CorpusDocument::from_text_file(&entry.title, &entry.author, &entry.path)?;
        index.add_document(&document)?;
        info!("indexed {:?} by {}", entry.title, entry.author);
    }
    index.commit()?;

    println!(
        "Indexed {} documents into {:?}",
        index.num_docs(),
        index_dir
    );
    Ok(())
}

fn run_corpus_search(config: &Config, sub: &ArgMatches) -> Result<()> {
    let query_text = sub.get_one::<String>("query").expect("required");
    let limit = *sub.get_one::<usize>("limit").expect("defaulted");
    let index = open_corpus(config, sub)?;

    print_hits(corpus_search::parse(&index, query_text, limit)?);
    Ok(())
}

fn run_corpus_all(config: &Config, sub: &ArgMatches) -> Result<()> {
    let words: Vec<&str> = sub
        .get_many::<String>("words")
        .expect("required")
        .map(String::as_str)
        .collect();
    let limit = *sub.get_one::<usize>("limit").expect("defaulted");
    let index = open_corpus(config, sub)?;

    print_hits(corpus_search::all_of(&index, &words, limit)?);
    Ok(())
}

fn run_corpus_phrase(config: &Config, sub: &ArgMatches) -> Result<()> {
    let phrase = sub.get_one::<String>("phrase").expect("required");
    let slop = *sub.get_one::<u32>("slop").expect("defaulted");
    let limit = *sub.get_one::<usize>("limit").expect("defaulted");
    let index = open_corpus(config, sub)?;

    print_hits(corpus_search::phrase(&index, phrase, slop, limit)?);
    Ok(())
}

fn run_corpus_terms(config: &Config, sub: &ArgMatches) -> Result<()> {
    let limit = *sub.get_one::<usize>("limit").expect("defaulted");
    let index = open_corpus(config, sub)?;

    let ranked = stats::top_terms(&index, limit)?;
    println!("Top {} most frequent terms:", ranked.len());
    for count in ranked {
        println!("{} ({})", count.term, count.total_term_freq);
    }
    Ok(())
}

fn run_corpus_similar(config: &Config, sub: &ArgMatches) -> Result<()> {
    let title = sub.get_one::<String>("title").expect("required");
    let limit = *sub.get_one::<usize>("limit").expect("defaulted");
    let index = open_corpus(config, sub)?;

    let hits = similar::similar_to(&index, title, limit, &SimilarityOptions::default())?;
    println!("Documents similar to {}:", title);
    for hit in hits {
        println!(" - {} (score: {:.4})", hit.title, hit.score);
    }
    Ok(())
}

fn run_corpus_rebuild(config: &Config, sub: &ArgMatches) -> Result<()> {
    let target_dir = sub.get_one::<String>("target").expect("required");
    let source = open_corpus(config, sub)?;
    let target_policy = match source.policy() {
        StopwordPolicy::Remove => StopwordPolicy::Keep,
        StopwordPolicy::Keep => StopwordPolicy::Remove,
    };

    let target = CorpusIndex::create_in_dir(
        Path::new(target_dir),
        target_policy,
        config.corpus.writer_heap_bytes,
    )?;
    let copied = source.rebuild_into(&target)?;

    println!(
        "Rebuilt {} documents into {:?} with policy {:?}",
        copied, target_dir, target_policy
    );
    Ok(())
}

fn corpus_dir(config: &Config, sub: &ArgMatches) -> PathBuf {
    sub.get_one::<String>("index-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.corpus.index_dir.clone())
}

fn open_corpus(config: &Config, sub: &ArgMatches) -> Result<CorpusIndex> {
    let dir = corpus_dir(config, sub);
    CorpusIndex::open_in_dir(&dir, config.corpus.writer_heap_bytes)
}

fn print_hits(hits: Vec<corpus_search::CorpusHit>) {
    println!("Total hits: {}", hits.len());
    for hit in hits {
        println!(" - {} ({})", hit.title, hit.author);
    }
}
