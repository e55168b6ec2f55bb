//! SQLite store backed by sqlx.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::{LedgerMap, Store, SubscriptionMap};
use crate::Result;

const CREATE_SUBSCRIPTIONS: &str = "CREATE TABLE IF NOT EXISTS subscriptions (
    channel_id  TEXT NOT NULL,
    position    INTEGER NOT NULL,
    locator     TEXT NOT NULL,
    PRIMARY KEY (channel_id, position)
)";

const CREATE_LEDGER: &str = "CREATE TABLE IF NOT EXISTS ledger (
    channel_id  TEXT NOT NULL,
    seq         INTEGER NOT NULL,
    item_id     TEXT NOT NULL,
    PRIMARY KEY (channel_id, item_id)
)";

/// Store backed by a SQLite database.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening SQLite store at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is a separate database, so pin one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_SUBSCRIPTIONS).execute(&self.pool).await?;
        sqlx::query(CREATE_LEDGER).execute(&self.pool).await?;
        Ok(())
    }

    async fn load_table(&self, query: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let rows: Vec<(String, String)> = sqlx::query_as(query).fetch_all(&self.pool).await?;

        let mut table = BTreeMap::<String, Vec<String>>::new();
        for (channel_id, value) in rows {
            table.entry(channel_id).or_default().push(value);
        }
        Ok(table)
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn load_subscriptions(&self) -> Result<SubscriptionMap> {
        self.load_table(
            "SELECT channel_id, locator FROM subscriptions ORDER BY channel_id, position",
        )
        .await
    }

    async fn save_subscriptions(&self, subscriptions: &SubscriptionMap) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM subscriptions")
            .execute(&mut *tx)
            .await?;
        for (channel_id, locators) in subscriptions {
            for (position, locator) in locators.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO subscriptions (channel_id, position, locator) VALUES (?, ?, ?)",
                )
                .bind(channel_id)
                .bind(position as i64)
                .bind(locator)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load_ledger(&self) -> Result<LedgerMap> {
        self.load_table("SELECT channel_id, item_id FROM ledger ORDER BY channel_id, seq")
            .await
    }

    async fn save_ledger(&self, ledger: &LedgerMap) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM ledger").execute(&mut *tx).await?;
        for (channel_id, item_ids) in ledger {
            for (seq, item_id) in item_ids.iter().enumerate() {
                sqlx::query(
                    "INSERT OR IGNORE INTO ledger (channel_id, seq, item_id) VALUES (?, ?, ?)",
                )
                .bind(channel_id)
                .bind(seq as i64)
                .bind(item_id)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }
}
