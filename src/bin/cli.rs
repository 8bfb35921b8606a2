//! claw-druid CLI
//!
//! Command-line interface for querying a Druid broker:
//! - Build and run queries from flags
//! - Inspect time boundaries and metadata
//! - List and drop data sources

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use claw_druid::config::{generate_default_config, Config, LoggingConfig};
use claw_druid::query::ResultSet;
use claw_druid::ClawDruid;

#[derive(Parser)]
#[command(name = "claw-druid")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query builder and paging client for Apache Druid")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Broker query endpoint
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Data source
    #[arg(short, long, global = true)]
    pub source: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and run a query
    Query {
        /// Group by dimensions
        #[arg(short, long)]
        group: Vec<String>,
        /// Columns: dimensions, `sum(x) as y`, `sum(a) // sum(b) as r`
        #[arg(long)]
        select: Option<String>,
        #[arg(long)]
        sum: Vec<String>,
        #[arg(long)]
        max: Vec<String>,
        #[arg(long)]
        min: Vec<String>,
        /// Count rows (`*`) or distinct values
        #[arg(long)]
        count: Vec<String>,
        /// Filter expression, e.g. "country = 'US' and clicks > 10"
        #[arg(short = 'w', long = "where")]
        filters: Vec<String>,
        /// Having expression over aggregations
        #[arg(long)]
        having: Option<String>,
        /// Order columns, e.g. "clicks desc"
        #[arg(short, long)]
        order: Vec<String>,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Top-N rows by the first order column
        #[arg(short, long)]
        top: Option<usize>,
        /// Fetch this page of a select query
        #[arg(short, long)]
        page: Option<u32>,
        #[arg(long)]
        granularity: Option<String>,
        /// Interval start (ISO 8601)
        #[arg(long)]
        begin: Option<String>,
        /// Interval end (ISO 8601)
        #[arg(long)]
        end: Option<String>,
        /// Interval covering the last N days
        #[arg(long, conflicts_with_all = ["begin", "end"])]
        last_days: Option<i64>,
        /// Print the query JSON without sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Earliest and latest event times
    TimeBoundary {
        #[arg(long, conflicts_with = "max")]
        min: bool,
        #[arg(long)]
        max: bool,
    },

    /// Data source metadata (last ingested event)
    SourceMeta,

    /// Segment column metadata
    SegmentMeta {
        #[arg(long, requires = "end")]
        begin: Option<String>,
        #[arg(long, requires = "begin")]
        end: Option<String>,
    },

    /// List data sources
    Sources,

    /// Drop a data source
    Drop {
        /// Data source name
        name: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(url) = &cli.url {
        config.druid.url = url.clone();
    }
    if let Some(source) = &cli.source {
        config.druid.data_source = source.clone();
    }

    init_logging(&config.logging);

    match cli.command {
        Commands::Query {
            group,
            select,
            sum,
            max,
            min,
            count,
            filters,
            having,
            order,
            limit,
            top,
            page,
            granularity,
            begin,
            end,
            last_days,
            dry_run,
        } => {
            let druid = connect(&config)?;
            let mut builder = druid.query();

            if let Some(days) = last_days {
                builder.last_days(days);
            }
            if let (Some(begin), Some(end)) = (begin, end) {
                builder.interval(begin, end);
            }
            if let Some(granularity) = granularity {
                builder.granularity(granularity);
            }
            if !group.is_empty() {
                builder.group(&as_strs(&group));
            }
            if let Some(columns) = &select {
                builder.select(columns)?;
            }
            builder.sum(&as_strs(&sum))?;
            builder.max(&as_strs(&max))?;
            builder.min(&as_strs(&min))?;
            builder.count(&as_strs(&count))?;
            for filter in &filters {
                builder.filter_expr(filter)?;
            }
            if let Some(having) = &having {
                builder.having(having)?;
            }
            if !order.is_empty() {
                builder.order(&as_strs(&order));
            }
            if let Some(limit) = limit {
                builder.limit(limit);
            }
            if let Some(top) = top {
                builder.top(top);
            }

            if dry_run {
                println!("{}", builder.to_json()?);
                return Ok(());
            }

            let result = match page {
                Some(n) => druid.page(&mut builder, n).await?,
                None => druid.execute(&builder).await?,
            };
            print_result(&result, &cli.format)?;
        }

        Commands::TimeBoundary { min, max } => {
            let druid = connect(&config)?;
            let mut builder = druid.query();
            if min {
                builder.min_time();
            } else if max {
                builder.max_time();
            } else {
                builder.time_boundary();
            }
            print_result(&druid.execute(&builder).await?, &cli.format)?;
        }

        Commands::SourceMeta => {
            let druid = connect(&config)?;
            let mut builder = druid.query();
            builder.source_meta();
            print_result(&druid.execute(&builder).await?, &cli.format)?;
        }

        Commands::SegmentMeta { begin, end } => {
            let druid = connect(&config)?;
            let mut builder = druid.query();
            builder.segment_meta();
            if let (Some(begin), Some(end)) = (begin, end) {
                builder.interval(begin, end);
            }
            print_result(&druid.execute(&builder).await?, &cli.format)?;
        }

        Commands::Sources => {
            let druid = ClawDruid::from_config(&config.druid)?;
            let sources = druid.data_sources().await?;
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&sources)?);
            } else if sources.is_empty() {
                println!("No data sources.");
            } else {
                for source in sources {
                    println!("{}", source);
                }
            }
        }

        Commands::Drop { name } => {
            let druid = ClawDruid::from_config(&config.druid)?;
            druid.drop_data_source(&name).await?;
            println!("Dropped {}", name);
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &content)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("claw_druid={}", logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Client for commands that query the configured data source
fn connect(config: &Config) -> anyhow::Result<ClawDruid> {
    if config.druid.data_source.is_empty() {
        bail!("no data source: pass --source or set [druid].data_source");
    }
    ClawDruid::from_config(&config.druid)
        .with_context(|| format!("cannot create client for {}", config.druid.url))
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

fn print_result(result: &ResultSet, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        let rows: Vec<Value> = result.rows().collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_table(result);
    }
    if let Some(identifiers) = result.paging_identifiers() {
        tracing::debug!(?identifiers, "page continuation");
    }
    eprintln!("{} rows in {} ms", result.len(), result.execution_time_ms);
    Ok(())
}

fn print_table(result: &ResultSet) {
    let mut rows = result.rows().peekable();
    let columns: Vec<String> = match rows.peek().and_then(Value::as_object) {
        Some(first) => first.keys().cloned().collect(),
        None => {
            println!("No data");
            return;
        }
    };

    for column in &columns {
        print!("{:<16} ", column);
    }
    println!();
    println!("{}", "-".repeat(columns.len() * 17));

    for row in rows {
        for column in &columns {
            let cell = match row.get(column) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => "-".to_string(),
                Some(other) => other.to_string(),
            };
            print!("{:<16} ", cell);
        }
        println!();
    }
}
