//! # claw-druid
//!
//! Fluent query builder and paging client for Apache Druid's native JSON
//! query API.
//!
//! ## Features
//!
//! - **Query builder**: group, select, aggregate, filter, having, order, limit, top
//! - **Expression compiler**: filter, having and post-aggregation strings
//!   compiled into Druid's JSON trees
//! - **Schema-exact output**: each query type serializes only the fields it accepts
//! - **Ordered paging**: select pages fetched in order with cached continuation tokens
//!
//! ## Modules
//!
//! - [`query`]: Builder, compiler, aggregation registry and executor
//! - [`transport`]: HTTP transport seam
//! - [`client`]: The [`ClawDruid`] facade
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use claw_druid::ClawDruid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let druid = ClawDruid::new("http://localhost:8082/druid/v2/", "ads")?;
//!
//!     let mut query = druid.query();
//!     query
//!         .last_days(7)
//!         .group(&["country"])
//!         .sum(&["revenue"])?
//!         .filter_expr("device = 'mobile' and clicks > 0")?
//!         .having("revenue > 100")?
//!         .order(&["revenue desc"])
//!         .limit(20);
//!
//!     let result = druid.execute(&query).await?;
//!     for row in result.rows() {
//!         println!("{}", row);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod query;
pub mod transport;

pub use client::ClawDruid;

pub use query::{
    FilterValue, Query, QueryBuilder, QueryError, QueryExecutor, QueryResult, QueryType,
    ResultSet,
};

pub use transport::{HttpTransport, Transport, TransportError};

pub use config::{Config, ConfigError, DruidConfig, LoggingConfig};
