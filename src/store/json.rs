//! JSON file store.
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so a crash mid-write leaves the previous file intact.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{LedgerMap, Store, SubscriptionMap};
use crate::{NewswireError, Result};

/// File holding the subscriptions table.
pub const SUBSCRIPTIONS_FILE: &str = "feeds.json";

/// File holding the ledger table.
pub const LEDGER_FILE: &str = "sent_links.json";

/// Store backed by two JSON files in one directory.
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store, creating the directory if it does not exist.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
        }
        info!("Opened JSON store at {:?}", dir);
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the store files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_table(&self, file: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let path = self.dir.join(file);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist yet, starting empty", file);
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(NewswireError::Storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| NewswireError::Storage(format!("corrupt {}: {}", path.display(), e)))
    }

    async fn write_table(&self, file: &str, table: &BTreeMap<String, Vec<String>>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(table)?;
        let target = self.dir.join(file);
        let tmp = self.dir.join(format!(".{file}.tmp"));

        let _guard = self.write_lock.lock().await;
        write_and_rename(&tmp, &target, &bytes)
            .await
            .map_err(|e| NewswireError::Storage(format!("failed to write {}: {}", target.display(), e)))
    }
}

async fn write_and_rename(tmp: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, target).await
}

#[async_trait]
impl Store for JsonFileStore {
    fn backend_name(&self) -> &'static str {
        "json"
    }

    async fn load_subscriptions(&self) -> Result<SubscriptionMap> {
        self.read_table(SUBSCRIPTIONS_FILE).await
    }

    async fn save_subscriptions(&self, subscriptions: &SubscriptionMap) -> Result<()> {
        self.write_table(SUBSCRIPTIONS_FILE, subscriptions).await
    }

    async fn load_ledger(&self) -> Result<LedgerMap> {
        self.read_table(LEDGER_FILE).await
    }

    async fn save_ledger(&self, ledger: &LedgerMap) -> Result<()> {
        self.write_table(LEDGER_FILE, ledger).await
    }
}
