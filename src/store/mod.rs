//! 批次状态存储
//!
//! 两张表，均以批次 ID 为键：
//! - 批次进度 `BatchProgress`
//! - 仍待重试的行 `Vec<HospitalRow>`：存在即非空，清空时整条删除
//!
//! 只有编排层会写入，且只在一轮并发全部结束之后按顺序写入。

use crate::error::StoreError;
use crate::models::{BatchProgress, BatchStatus, HospitalRow};
use std::collections::HashMap;
use std::sync::Mutex;

pub type StoreResult<T> = Result<T, StoreError>;

/// 批次状态存储的键值契约
pub trait BatchStore: Send + Sync {
    /// 注册（或覆盖）一个批次的进度
    fn init_progress(&self, batch_id: &str, progress: BatchProgress) -> StoreResult<()>;

    fn progress(&self, batch_id: &str) -> StoreResult<Option<BatchProgress>>;

    /// 记录一行的最终结果：`processed += 1`，失败时 `failed += 1`
    fn record_outcome(&self, batch_id: &str, failed: bool) -> StoreResult<()>;

    fn set_status(&self, batch_id: &str, status: BatchStatus) -> StoreResult<()>;

    /// 追加一行到待重试集合，必要时创建集合
    fn push_failed_row(&self, batch_id: &str, row: HospitalRow) -> StoreResult<()>;

    /// 当前待重试的行；不存在时返回空列表
    fn failed_rows(&self, batch_id: &str) -> StoreResult<Vec<HospitalRow>>;

    /// 整体替换待重试集合，传入空列表等同于删除
    fn replace_failed_rows(&self, batch_id: &str, rows: Vec<HospitalRow>) -> StoreResult<()>;

    fn has_failed_rows(&self, batch_id: &str) -> StoreResult<bool> {
        Ok(!self.failed_rows(batch_id)?.is_empty())
    }
}

/// 进程内存实现，生命周期与进程相同
#[derive(Debug, Default)]
pub struct InMemoryBatchStore {
    progress: Mutex<HashMap<String, BatchProgress>>,
    failed_rows: Mutex<HashMap<String, Vec<HospitalRow>>>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_progress<R>(
        &self,
        batch_id: &str,
        update: impl FnOnce(&mut BatchProgress) -> R,
    ) -> StoreResult<R> {
        let mut progress = self.progress.lock()?;
        let entry = progress
            .get_mut(batch_id)
            .ok_or_else(|| StoreError::Unavailable(format!("no progress for batch {batch_id}")))?;
        Ok(update(entry))
    }
}

impl BatchStore for InMemoryBatchStore {
    fn init_progress(&self, batch_id: &str, progress: BatchProgress) -> StoreResult<()> {
        self.progress.lock()?.insert(batch_id.to_string(), progress);
        Ok(())
    }

    fn progress(&self, batch_id: &str) -> StoreResult<Option<BatchProgress>> {
        Ok(self.progress.lock()?.get(batch_id).cloned())
    }

    fn record_outcome(&self, batch_id: &str, failed: bool) -> StoreResult<()> {
        self.with_progress(batch_id, |progress| {
            progress.processed += 1;
            if failed {
                progress.failed += 1;
            }
        })
    }

    fn set_status(&self, batch_id: &str, status: BatchStatus) -> StoreResult<()> {
        self.with_progress(batch_id, |progress| progress.status = status)
    }

    fn push_failed_row(&self, batch_id: &str, row: HospitalRow) -> StoreResult<()> {
        self.failed_rows
            .lock()?
            .entry(batch_id.to_string())
            .or_default()
            .push(row);
        Ok(())
    }

    fn failed_rows(&self, batch_id: &str) -> StoreResult<Vec<HospitalRow>> {
        Ok(self
            .failed_rows
            .lock()?
            .get(batch_id)
            .cloned()
            .unwrap_or_default())
    }

    fn replace_failed_rows(&self, batch_id: &str, rows: Vec<HospitalRow>) -> StoreResult<()> {
        let mut failed_rows = self.failed_rows.lock()?;
        if rows.is_empty() {
            failed_rows.remove(batch_id);
        } else {
            failed_rows.insert(batch_id.to_string(), rows);
        }
        Ok(())
    }

    fn has_failed_rows(&self, batch_id: &str) -> StoreResult<bool> {
        Ok(self.failed_rows.lock()?.contains_key(batch_id))
    }
}
