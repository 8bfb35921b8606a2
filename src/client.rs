//! Client facade
//!
//! [`ClawDruid`] binds a transport to a default data source and hands out
//! builders for it.

use serde_json::Value;
use std::sync::Arc;

use crate::config::DruidConfig;
use crate::query::{
    QueryBuilder, QueryError, QueryExecutor, QueryResult, ResultSet, DEFAULT_PAGE_THRESHOLD,
};
use crate::transport::{HttpTransport, Transport};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Druid client for one endpoint and data source
#[derive(Debug, Clone)]
pub struct ClawDruid {
    executor: QueryExecutor,
    data_source: String,
    page_threshold: usize,
}

impl ClawDruid {
    /// Connect to a broker URL with default timeout and retries
    pub fn new(url: impl Into<String>, data_source: impl Into<String>) -> QueryResult<Self> {
        let transport = HttpTransport::new(url, DEFAULT_TIMEOUT_MS, DEFAULT_MAX_RETRIES)?;
        Ok(Self::with_transport(Arc::new(transport), data_source))
    }

    pub fn from_config(config: &DruidConfig) -> QueryResult<Self> {
        let transport = HttpTransport::from_config(config)?;
        Ok(Self::with_transport(Arc::new(transport), &config.data_source)
            .with_page_threshold(config.page_threshold))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, data_source: impl Into<String>) -> Self {
        Self {
            executor: QueryExecutor::new(transport),
            data_source: data_source.into(),
            page_threshold: DEFAULT_PAGE_THRESHOLD,
        }
    }

    /// Override the rows-per-page of builders created from now on
    pub fn with_page_threshold(mut self, threshold: usize) -> Self {
        self.page_threshold = threshold;
        self
    }

    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    pub fn endpoint(&self) -> &str {
        self.executor.transport().endpoint()
    }

    /// A fresh builder over the default data source
    pub fn query(&self) -> QueryBuilder {
        self.query_source(&self.data_source)
    }

    /// A fresh builder over another data source
    pub fn query_source(&self, data_source: &str) -> QueryBuilder {
        let mut builder = QueryBuilder::new(data_source);
        builder.page_size(self.page_threshold);
        builder
    }

    pub async fn execute(&self, builder: &QueryBuilder) -> QueryResult<ResultSet> {
        self.executor.execute(builder).await
    }

    /// Fetch page `n` of a select query; see [`QueryExecutor::page`]
    pub async fn page(&self, builder: &mut QueryBuilder, n: u32) -> QueryResult<ResultSet> {
        self.executor.page(builder, n).await
    }

    /// POST a hand-written query body unchanged
    pub async fn raw_query(&self, body: &Value) -> QueryResult<Value> {
        Ok(self.executor.transport().post_json(body).await?)
    }

    /// Names of the data sources the broker knows about
    pub async fn data_sources(&self) -> QueryResult<Vec<String>> {
        let response = self.executor.transport().get_json("datasources").await?;
        serde_json::from_value(response).map_err(QueryError::from)
    }

    /// Disable a data source
    pub async fn drop_data_source(&self, name: &str) -> QueryResult<()> {
        if name.trim().is_empty() {
            return Err(QueryError::SchemaViolation(
                "data source name must not be empty".to_string(),
            ));
        }
        tracing::info!(data_source = name, "dropping data source");
        self.executor
            .transport()
            .delete(&format!("datasources/{}", name))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::RecordingTransport;
    use serde_json::json;

    fn client(transport: &Arc<RecordingTransport>) -> ClawDruid {
        ClawDruid::with_transport(transport.clone(), "ads").with_page_threshold(25)
    }

    #[test]
    fn test_query_uses_defaults() {
        let transport = Arc::new(RecordingTransport::new());
        let druid = client(&transport);
        let builder = druid.query();
        assert_eq!(builder.data_source(), "ads");
        assert_eq!(builder.page_threshold(), 25);
        assert_eq!(druid.query_source("clicks").data_source(), "clicks");
        assert_eq!(druid.endpoint(), "memory://druid");
    }

    #[test]
    fn test_from_config() {
        let config = DruidConfig {
            data_source: "events".to_string(),
            page_threshold: 10,
            ..DruidConfig::default()
        };
        let druid = ClawDruid::from_config(&config).unwrap();
        assert_eq!(druid.data_source(), "events");
        assert_eq!(druid.query().page_threshold(), 10);
    }

    #[tokio::test]
    async fn test_execute_group_by() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(json!([
            {"version": "v1", "timestamp": "t", "event": {"country": "US", "revenue": 12.5}}
        ]));
        let druid = client(&transport);

        let mut builder = druid.query();
        builder
            .group(&["country"])
            .sum(&["revenue"])
            .unwrap()
            .interval("2020-01-01", "2020-01-02");
        let result = druid.execute(&builder).await.unwrap();

        assert_eq!(result.rows().next().unwrap()["revenue"], 12.5);
        assert_eq!(transport.requests()[0]["queryType"], "groupBy");
    }

    #[tokio::test]
    async fn test_raw_query_passthrough() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(json!([{"result": {"maxTime": "x"}}]));
        let druid = client(&transport);

        let body = json!({"queryType": "timeBoundary", "dataSource": "ads"});
        let response = druid.raw_query(&body).await.unwrap();
        assert_eq!(response[0]["result"]["maxTime"], "x");
        assert_eq!(transport.requests()[0], body);
    }

    #[tokio::test]
    async fn test_data_sources_and_drop() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(json!(["ads", "clicks"])).respond(json!(null));
        let druid = client(&transport);

        assert_eq!(druid.data_sources().await.unwrap(), vec!["ads", "clicks"]);
        druid.drop_data_source("clicks").await.unwrap();
        assert!(druid.drop_data_source(" ").await.is_err());

        assert_eq!(
            transport.paths(),
            vec!["GET datasources".to_string(), "DELETE datasources/clicks".to_string()]
        );
    }
}
