//! Paged read access to the relational record store.

mod tls;

pub use tls::{SslMode, TlsBuilder};

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::core::DataRecord;
use crate::error::{BatchError, Result};

/// PostgreSQL's identifier limit (NAMEDATALEN - 1).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Read-only, paged view of the exported records.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Up to `limit` records with `id > after_id`, ascending by `id`.
    /// `None` starts from the beginning.
    async fn find_page(&self, after_id: Option<i64>, limit: usize) -> Result<Vec<DataRecord>>;

    /// Connectivity probe.
    async fn ping(&self) -> Result<()>;
}

/// [`RecordRepository`] over a deadpool-postgres connection pool.
pub struct PgRecordRepository {
    pool: Pool,
    page_sql: String,
}

impl PgRecordRepository {
    /// Build the pool and verify connectivity.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let table = quote_table(&config.table)?;

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let tls = TlsBuilder::new(SslMode::parse(&config.ssl_mode)?).build()?;
        let mgr = match tls {
            Some(connector) => Manager::from_config(pg_config, connector, mgr_config),
            None => {
                warn!("database TLS is disabled; credentials are sent in plaintext");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| BatchError::pool(e, "creating PostgreSQL pool"))?;

        let repo = Self {
            pool,
            page_sql: page_query(&table),
        };
        repo.ping().await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{} (table {})",
            config.host, config.port, config.database, table
        );

        Ok(repo)
    }
}

#[async_trait]
impl RecordRepository for PgRecordRepository {
    async fn find_page(&self, after_id: Option<i64>, limit: usize) -> Result<Vec<DataRecord>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| BatchError::pool(e, "reading record page"))?;

        let after = after_id.unwrap_or(i64::MIN);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = client.query(self.page_sql.as_str(), &[&after, &limit]).await?;

        debug!("fetched {} records after id {:?}", rows.len(), after_id);

        rows.iter()
            .map(|row| -> Result<DataRecord> {
                Ok(DataRecord {
                    id: row.try_get(0)?,
                    field1: row.try_get(1)?,
                    field2: row.try_get(2)?,
                    field3: row.try_get(3)?,
                    created_at: row.try_get(4)?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| BatchError::pool(e, "testing PostgreSQL connection"))?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }
}

fn page_query(table: &str) -> String {
    format!(
        "SELECT id::bigint, field1::text, field2::text, field3::text, created_at::timestamp \
         FROM {} WHERE id > $1 ORDER BY id ASC LIMIT $2",
        table
    )
}

/// Quote a PostgreSQL identifier, doubling embedded quotes.
fn quote_ident(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(BatchError::Config("database.table: empty identifier".into()));
    }
    if name.contains('\0') {
        return Err(BatchError::Config(format!(
            "database.table: identifier contains a null byte: {:?}",
            name
        )));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(BatchError::Config(format!(
            "database.table: identifier longer than {} bytes: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a table name, optionally `schema.table`.
pub fn quote_table(name: &str) -> Result<String> {
    match name.split_once('.') {
        Some((schema, table)) => Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?)),
        None => quote_ident(name),
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Repository over a fixed set of records.
    pub(crate) struct MemoryRecordRepository {
        records: Vec<DataRecord>,
        pub(crate) fetches: AtomicUsize,
        fail_on_fetch: Option<usize>,
    }

    impl MemoryRecordRepository {
        pub(crate) fn new(mut records: Vec<DataRecord>) -> Self {
            records.sort_by_key(|r| r.id);
            Self {
                records,
                fetches: AtomicUsize::new(0),
                fail_on_fetch: None,
            }
        }

        /// Fail the `n`th fetch (zero-based).
        pub(crate) fn failing_on_fetch(mut self, n: usize) -> Self {
            self.fail_on_fetch = Some(n);
            self
        }

        /// Records `1..=n` with `field1` set, except every id in `blank`.
        pub(crate) fn numbered(n: i64, blank: &[i64]) -> Self {
            Self::new(
                (1..=n)
                    .map(|id| {
                        let f1 = if blank.contains(&id) { "" } else { "name" };
                        DataRecord::new(id, f1, format!("v#{}", id), "x")
                    })
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl RecordRepository for MemoryRecordRepository {
        async fn find_page(&self, after_id: Option<i64>, limit: usize) -> Result<Vec<DataRecord>> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_fetch == Some(n) {
                return Err(BatchError::pool("connection refused", "reading record page"));
            }
            Ok(self
                .records
                .iter()
                .filter(|r| after_id.map_or(true, |after| r.id > after))
                .take(limit)
                .cloned()
                .collect())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_table() {
        assert_eq!(quote_table("data_records").unwrap(), "\"data_records\"");
        assert_eq!(
            quote_table("exports.data_records").unwrap(),
            "\"exports\".\"data_records\""
        );
        assert_eq!(quote_table("we\"ird").unwrap(), "\"we\"\"ird\"");
        assert!(quote_table("").is_err());
        assert!(quote_table("a\0b").is_err());
        assert!(quote_table(&"t".repeat(64)).is_err());
    }

    #[test]
    fn test_page_query_is_keyset() {
        let sql = page_query("\"data_records\"");
        assert!(sql.contains("FROM \"data_records\" WHERE id > $1 ORDER BY id ASC LIMIT $2"));
    }
}
