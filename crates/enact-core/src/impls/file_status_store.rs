//! FileStatusStore - JSON Lines ファイルによる StatusStore
//!
//! # 実装詳細
//! - 1 レコード = 1 行。追記のみで、既存の行は書き換えない
//! - open 時に全行を読み込み、task_id ごとに最初の行を採用（後続の重複は無視）
//! - upsert は書き込み後に `sync_data` してから成功を返す
//! - 書き込み・sync が失敗したら書き込み前の長さまで切り詰めてから Err を返す
//! - 最終行に改行が無い場合（書き込み中のクラッシュ）:
//!   - JSON として読めるならレコードとして採用し、欠けた改行を補う
//!   - 読めないなら読み飛ばし、open 時に切り詰める
//!
//! メモリ上の records は常にディスク上の完結した行と一致する。

use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::{StatusRecord, StoreError, TaskId};
use crate::ports::{StatusStore, UpsertOutcome};

/// Append-only log the store writes to.
#[async_trait]
trait AppendLog: Send {
    async fn append(&mut self, bytes: &[u8]) -> io::Result<()>;
    async fn sync(&mut self) -> io::Result<()>;
    async fn truncate(&mut self, len: u64) -> io::Result<()>;
}

#[async_trait]
impl AppendLog for File {
    async fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes).await?;
        // surfaces errors from the background write
        self.flush().await
    }

    async fn sync(&mut self) -> io::Result<()> {
        self.sync_data().await
    }

    async fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len).await?;
        self.sync_data().await
    }
}

pub struct FileStatusStore {
    path: PathBuf,
    inner: Mutex<FileState>,
}

struct FileState {
    log: Box<dyn AppendLog>,
    /// Bytes of complete lines on disk.
    len: u64,
    /// A failed append could not be rolled back yet.
    dirty: bool,
    records: HashMap<TaskId, StatusRecord>,
}

/// How the file ends.
#[derive(Debug, PartialEq, Eq)]
enum Tail {
    Clean,
    /// Last line is a full record that lost its newline.
    Unterminated,
    /// Last line is a fragment.
    Torn,
}

impl FileStatusStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let (records, tail) = load_records(&contents)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let len = match tail {
            Tail::Clean => contents.len() as u64,
            Tail::Unterminated => {
                file.append(b"\n").await?;
                file.sync().await?;
                contents.len() as u64 + 1
            }
            Tail::Torn => {
                // drop the fragment so the next append starts on a fresh line
                let keep = contents.rfind('\n').map_or(0, |i| i + 1) as u64;
                file.truncate(keep).await?;
                keep
            }
        };

        info!(path = %path.display(), records = records.len(), "status store opened");
        Ok(Self {
            path,
            inner: Mutex::new(FileState {
                log: Box::new(file),
                len,
                dirty: false,
                records,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_records(contents: &str) -> Result<(HashMap<TaskId, StatusRecord>, Tail), StoreError> {
    let mut records = HashMap::new();
    let unterminated = !contents.is_empty() && !contents.ends_with('\n');
    let mut tail = if unterminated { Tail::Unterminated } else { Tail::Clean };
    let lines: Vec<&str> = contents.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: StatusRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(source) if unterminated && idx + 1 == lines.len() => {
                warn!(line = idx + 1, error = %source, "skipping torn trailing status record");
                tail = Tail::Torn;
                continue;
            }
            Err(source) => return Err(StoreError::Corrupt { line: idx + 1, source }),
        };
        records.entry(record.task_id.clone()).or_insert(record);
    }
    Ok((records, tail))
}

impl FileState {
    async fn rollback(&mut self) -> io::Result<()> {
        self.log.truncate(self.len).await?;
        self.dirty = false;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for FileStatusStore {
    async fn upsert(&self, record: StatusRecord) -> Result<UpsertOutcome, StoreError> {
        let mut state = self.inner.lock().await;
        if let Some(existing) = state.records.get(&record.task_id) {
            return Ok(UpsertOutcome::AlreadyRecorded(existing.clone()));
        }
        if state.dirty {
            state.rollback().await?;
        }

        let mut line = serde_json::to_vec(&record).map_err(StoreError::Encode)?;
        line.push(b'\n');

        let written = match state.log.append(&line).await {
            Ok(()) => state.log.sync().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            state.dirty = true;
            if let Err(rollback) = state.rollback().await {
                error!(error = %rollback, "could not roll back partial status record");
            }
            return Err(e.into());
        }

        state.len += line.len() as u64;
        state.records.insert(record.task_id.clone(), record);
        Ok(UpsertOutcome::Created)
    }

    async fn get(&self, task_id: &TaskId) -> Result<Option<StatusRecord>, StoreError> {
        Ok(self.inner.lock().await.records.get(task_id).cloned())
    }
}
