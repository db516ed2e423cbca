//! hondana - command line driver for configured manga sources
//!
//! Loads a TOML catalog, runs one operation against one source and prints
//! the result as JSON on stdout. Logs go to stderr (`RUST_LOG` applies).

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use hondana::filter::{FilterDescriptor, FilterKind, FilterValue};
use hondana::prelude::*;
use hondana::{Error, Result};

#[derive(Parser)]
#[command(name = "hondana")]
#[command(about = "Query configured manga sites from the command line")]
#[command(version)]
struct Cli {
    /// Catalog file with [[sources]] tables
    #[arg(short, long, default_value = "sources.toml")]
    catalog: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the ids of every configured source
    Sources,
    /// Popular listing
    Popular {
        source: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Latest updates listing
    Latest {
        source: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Search one source, or all of them with --all
    Search {
        /// Source id (ignored with --all)
        source: String,
        query: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// Filter as NAME=VALUE; select filters take an option label, value or index
        #[arg(short, long = "filter")]
        filters: Vec<String>,
        /// Search every source and merge the results
        #[arg(long)]
        all: bool,
    },
    /// Collection listing
    Collection {
        source: String,
        path: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Manga metadata and chapters
    Detail { source: String, url: String },
    /// Chapter page images
    Pages { source: String, url: String },
    /// Filters a source accepts
    Filters { source: String },
    /// Collections a source offers
    Collections { source: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("hondana={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let sources = Sources::load(&cli.catalog).await?;

    match cli.command {
        Commands::Sources => print_json(&sources.list_ids()),
        Commands::Popular { source, page } => {
            let page = find(&sources, &source)?.popular_list(Cursor::Page(page)).await?;
            print_json(&page)
        }
        Commands::Latest { source, page } => {
            let page = find(&sources, &source)?.latest_list(Cursor::Page(page)).await?;
            print_json(&page)
        }
        Commands::Search {
            source,
            query,
            page,
            filters,
            all,
        } => {
            if all {
                let results = sources
                    .search(query)
                    .page(page)
                    .flatten()
                    .await?
                    .dedupe_by_title();
                return print_json(&results);
            }

            let src = find(&sources, &source)?;
            let values = filters
                .iter()
                .map(|raw| parse_filter(src.filters(), raw))
                .collect::<Result<Vec<_>>>()?;
            let query = SearchQuery {
                query,
                cursor: Cursor::Page(page),
                filters: values,
            };
            print_json(&src.search_list(query).await?)
        }
        Commands::Collection { source, path, page } => {
            let page = find(&sources, &source)?.collection_list(&path, Cursor::Page(page)).await?;
            print_json(&page)
        }
        Commands::Detail { source, url } => print_json(&find(&sources, &source)?.fetch_detail(&url).await?),
        Commands::Pages { source, url } => print_json(&find(&sources, &source)?.fetch_pages(&url).await?),
        Commands::Filters { source } => print_json(&find(&sources, &source)?.filters()),
        Commands::Collections { source } => print_json(&find(&sources, &source)?.collections()),
    }
}

fn find<'a>(sources: &'a Sources, id: &str) -> Result<&'a dyn Source> {
    sources
        .get(id)
        .ok_or_else(|| Error::not_found(format!("Source: {id} (known: {})", sources.list_ids().join(", "))))
}

/// Maps `NAME=VALUE` onto the declared filter of that name or key.
fn parse_filter(descriptors: &[FilterDescriptor], raw: &str) -> Result<FilterValue> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| Error::parse(format!("filter `{raw}` is not NAME=VALUE")))?;
    let (name, value) = (name.trim(), value.trim());
    let descriptor = descriptors
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name) || d.key == name)
        .ok_or_else(|| Error::not_found(format!("Filter: {name}")))?;

    Ok(match &descriptor.kind {
        FilterKind::Text => FilterValue::text(&descriptor.name, value),
        FilterKind::Select { options, .. } => {
            let index = options
                .iter()
                .position(|o| o.label.eq_ignore_ascii_case(value) || o.value == value)
                .or_else(|| value.parse::<usize>().ok().filter(|i| *i < options.len()))
                .ok_or_else(|| Error::parse(format!("`{value}` is not an option of filter `{name}`")))?;
            FilterValue::select(&descriptor.name, index)
        }
        FilterKind::Checkbox { .. } => {
            let checked = matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
            FilterValue::checkbox(&descriptor.name, checked)
        }
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
