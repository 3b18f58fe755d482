use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::SecondsFormat;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::types::ServerRecord;
use crate::{Error, Result, ServerLog};

/// `launch_time,instance_id,public_host` lines appended to a local file.
#[derive(Debug, Clone)]
pub struct CsvServerLog {
    path: PathBuf,
}

impl CsvServerLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

pub fn format_record(record: &ServerRecord) -> String {
    format!(
        "{},{},{}\n",
        record.launch_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        record.instance_id,
        record.public_host
    )
}

#[async_trait]
impl ServerLog for CsvServerLog {
    async fn append(&self, record: &ServerRecord) -> Result<()> {
        let line = format_record(record);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::ServerLog(format!("open {}: {e}", self.path.display())))?;

        // One write per record keeps concurrent appends line-atomic.
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::ServerLog(format!("append {}: {e}", self.path.display())))?;
        file.flush()
            .await
            .map_err(|e| Error::ServerLog(format!("flush {}: {e}", self.path.display())))?;

        info!(instance_id = %record.instance_id, path = %self.path.display(), "server recorded");
        Ok(())
    }
}
