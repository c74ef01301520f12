//! 批次处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责批次级别的两个协议：首轮处理与续跑。
//!
//! ## 核心功能
//!
//! 1. **首轮处理** `process`：生成批次 ID，登记进度，并发创建所有行，
//!    全部成功才激活批次
//! 2. **续跑** `resume`：只重试上一轮仍失败的行，全部成功后激活批次
//! 3. **进度查询** `get_progress`
//!
//! ## 设计特点
//!
//! - **并发结束后再写状态**：存储只在整轮 join 之后按行顺序更新
//! - **计数只增不减**：续跑不回退 `processed` / `failed`
//! - **激活失败不算激活**：状态记为 `completed_with_errors`，结果保持 `created`

use crate::clients::{HospitalApi, HospitalApiClient};
use crate::config::Config;
use crate::error::{AppResult, BatchError};
use crate::models::{
    BatchProgress, BatchResult, BatchStatus, HospitalRow, HospitalStatus, ResumeResult,
};
use crate::orchestrator::row_processor::{self, RowPartition};
use crate::store::{BatchStore, InMemoryBatchStore};
use crate::utils::logging;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// 批次编排器
#[derive(Clone)]
pub struct BatchOrchestrator {
    api: Arc<dyn HospitalApi>,
    store: Arc<dyn BatchStore>,
}

impl BatchOrchestrator {
    pub fn new(api: Arc<dyn HospitalApi>, store: Arc<dyn BatchStore>) -> Self {
        Self { api, store }
    }

    /// 使用真实客户端和内存存储创建
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let api = HospitalApiClient::new(config)?;
        Ok(Self::new(
            Arc::new(api),
            Arc::new(InMemoryBatchStore::new()),
        ))
    }

    pub fn store(&self) -> &Arc<dyn BatchStore> {
        &self.store
    }

    /// 首轮处理一个新批次
    ///
    /// 部分行失败是正常结果，不会返回错误；只有空批次和存储不可用才会失败。
    pub async fn process(&self, rows: &[HospitalRow]) -> AppResult<BatchResult> {
        if rows.is_empty() {
            return Err(BatchError::EmptyBatch.into());
        }

        let started = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let total = rows.len();

        self.store.init_progress(&batch_id, BatchProgress::new(total))?;
        logging::log_batch_start(&batch_id, total);

        let outcomes = row_processor::create_rows(&self.api, rows, &batch_id).await;
        let mut partition = row_processor::partition(rows, outcomes);

        for result in &partition.results {
            self.store.record_outcome(&batch_id, result.is_failed())?;
        }
        for row in &partition.failed_rows {
            self.store.push_failed_row(&batch_id, row.clone())?;
        }

        let batch_activated = self.finish_pass(&batch_id, &mut partition).await?;

        let elapsed = started.elapsed().as_secs_f64();
        let result = BatchResult {
            batch_id,
            total_hospitals: total,
            processed_hospitals: partition.succeeded,
            failed_hospitals: partition.failed(),
            processing_time_seconds: (elapsed * 100.0).round() / 100.0,
            batch_activated,
            hospitals: partition.results,
        };

        logging::log_batch_complete(
            &result.batch_id,
            result.processed_hospitals,
            result.failed_hospitals,
            result.batch_activated,
        );

        Ok(result)
    }

    /// 只重试该批次仍失败的行
    ///
    /// 没有待重试行时返回 `BatchError::NothingToResume`，不修改任何状态。
    pub async fn resume(&self, batch_id: &str) -> AppResult<ResumeResult> {
        let rows = self.store.failed_rows(batch_id)?;
        if rows.is_empty() {
            return Err(BatchError::NothingToResume {
                batch_id: batch_id.to_string(),
            }
            .into());
        }

        info!("[批次 {}] 🔁 续跑 {} 个失败行", batch_id, rows.len());

        let outcomes = row_processor::create_rows(&self.api, &rows, batch_id).await;
        let mut partition = row_processor::partition(&rows, outcomes);

        // 本轮成功的行移出待重试集合，全部成功时整条删除
        self.store.replace_failed_rows(batch_id, partition.failed_rows.clone())?;

        let batch_activated = self.finish_pass(batch_id, &mut partition).await?;

        logging::log_batch_complete(
            batch_id,
            partition.succeeded,
            partition.failed(),
            batch_activated,
        );

        Ok(ResumeResult {
            batch_id: batch_id.to_string(),
            retried: rows.len(),
            success: partition.succeeded,
            failed: partition.failed(),
            batch_activated,
            results: partition.results,
        })
    }

    /// 查询批次进度
    pub fn get_progress(&self, batch_id: &str) -> AppResult<BatchProgress> {
        self.store.progress(batch_id)?.ok_or_else(|| {
            BatchError::NotFound {
                batch_id: batch_id.to_string(),
            }
            .into()
        })
    }

    /// 一轮结束：全部成功则激活，并写入最终状态
    ///
    /// # 返回
    /// 本轮是否完成激活
    async fn finish_pass(&self, batch_id: &str, partition: &mut RowPartition) -> AppResult<bool> {
        if !partition.all_succeeded() || self.store.has_failed_rows(batch_id)? {
            warn!(
                "[批次 {}] ⚠️ 仍有 {} 行失败，跳过激活",
                batch_id,
                partition.failed()
            );
            self.store.set_status(batch_id, BatchStatus::CompletedWithErrors)?;
            return Ok(false);
        }

        if !self.activate(batch_id).await {
            self.store.set_status(batch_id, BatchStatus::CompletedWithErrors)?;
            return Ok(false);
        }

        for result in &mut partition.results {
            result.status = HospitalStatus::CreatedAndActivated;
        }
        self.store.set_status(batch_id, BatchStatus::Completed)?;
        Ok(true)
    }

    async fn activate(&self, batch_id: &str) -> bool {
        info!("[批次 {}] 📤 所有行创建成功，正在激活批次...", batch_id);

        match self.api.activate_batch(batch_id).await {
            Ok(_) => {
                info!("[批次 {}] ✓ 批次激活成功", batch_id);
                true
            }
            Err(e) => {
                error!("[批次 {}] 批次激活失败: {}", batch_id, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::RetryPolicy;
    use crate::error::{ApiError, AppError};
    use crate::models::{CreateHospitalPayload, CreatedHospital};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Barrier;
    use tokio::time::Instant as TestInstant;

    /// 内存版目录服务：按名称决定某行是否失败
    #[derive(Default)]
    struct FakeDirectory {
        failing_names: Mutex<HashSet<String>>,
        panicking_names: Mutex<HashSet<String>>,
        activation_fails: AtomicBool,
        next_id: AtomicI64,
        create_calls: AtomicUsize,
        activated: Mutex<Vec<String>>,
        barrier: Option<Barrier>,
    }

    impl FakeDirectory {
        fn failing(names: &[&str]) -> Self {
            let fake = Self::default();
            fake.fail(names);
            fake
        }

        fn fail(&self, names: &[&str]) {
            let mut failing = self.failing_names.lock().unwrap();
            failing.clear();
            failing.extend(names.iter().map(|n| n.to_string()));
        }

        fn activations(&self) -> Vec<String> {
            self.activated.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HospitalApi for FakeDirectory {
        async fn create_hospital(
            &self,
            payload: &CreateHospitalPayload,
        ) -> Result<CreatedHospital, ApiError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            let panics = self.panicking_names.lock().unwrap().contains(&payload.name);
            if panics {
                panic!("directory crashed on {}", payload.name);
            }
            if self.failing_names.lock().unwrap().contains(&payload.name) {
                return Err(ApiError::RetriesExhausted {
                    operation: "create_hospital".to_string(),
                    attempts: 3,
                    last_error: Box::new(ApiError::BadResponse {
                        endpoint: "/hospitals/".to_string(),
                        status: 500,
                        body: format!("cannot create {}", payload.name),
                    }),
                });
            }
            Ok(CreatedHospital {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            })
        }

        async fn activate_batch(&self, batch_id: &str) -> Result<Value, ApiError> {
            if self.activation_fails.load(Ordering::SeqCst) {
                return Err(ApiError::BadResponse {
                    endpoint: "/hospitals/batch/activate".to_string(),
                    status: 502,
                    body: "gateway".to_string(),
                });
            }
            self.activated.lock().unwrap().push(batch_id.to_string());
            Ok(json!({ "status": "activated" }))
        }
    }

    /// 经过真实重试策略的目录服务：`flaky_name` 前两次失败，记录每行完成时刻
    struct FlakyDirectory {
        retry: RetryPolicy,
        flaky_name: String,
        started: TestInstant,
        attempts: Mutex<HashMap<String, u32>>,
        finished: Mutex<HashMap<String, Duration>>,
    }

    #[async_trait]
    impl HospitalApi for FlakyDirectory {
        async fn create_hospital(
            &self,
            payload: &CreateHospitalPayload,
        ) -> Result<CreatedHospital, ApiError> {
            let created = self
                .retry
                .run("create_hospital", move || async move {
                    let attempt = {
                        let mut attempts = self.attempts.lock().unwrap();
                        let count = attempts.entry(payload.name.clone()).or_insert(0);
                        *count += 1;
                        *count
                    };
                    if payload.name == self.flaky_name && attempt < 3 {
                        return Err(ApiError::BadResponse {
                            endpoint: "/hospitals/".to_string(),
                            status: 503,
                            body: format!("attempt {attempt}"),
                        });
                    }
                    Ok(CreatedHospital {
                        id: i64::from(attempt),
                    })
                })
                .await;
            self.finished
                .lock()
                .unwrap()
                .insert(payload.name.clone(), self.started.elapsed());
            created
        }

        async fn activate_batch(&self, _batch_id: &str) -> Result<Value, ApiError> {
            Ok(Value::Null)
        }
    }

    fn orchestrator(fake: &Arc<FakeDirectory>) -> BatchOrchestrator {
        let api: Arc<dyn HospitalApi> = fake.clone();
        BatchOrchestrator::new(api, Arc::new(InMemoryBatchStore::new()))
    }

    fn two_rows() -> Vec<HospitalRow> {
        vec![
            HospitalRow::new(1, "H1", "A1"),
            HospitalRow::new(2, "H2", "A2"),
        ]
    }

    #[tokio::test]
    async fn test_all_rows_succeed_activates_batch() {
        let fake = Arc::new(FakeDirectory::default());
        let orchestrator = orchestrator(&fake);

        let result = orchestrator.process(&two_rows()).await.unwrap();

        assert_eq!(result.total_hospitals, 2);
        assert_eq!(result.processed_hospitals, 2);
        assert_eq!(result.failed_hospitals, 0);
        assert!(result.batch_activated);
        assert!(result
            .hospitals
            .iter()
            .all(|h| h.status == HospitalStatus::CreatedAndActivated && h.hospital_id.is_some()));
        assert_eq!(fake.activations(), vec![result.batch_id.clone()]);

        let progress = orchestrator.get_progress(&result.batch_id).unwrap();
        assert_eq!(progress.total, 2);
        assert_eq!(progress.processed, 2);
        assert_eq!(progress.failed, 0);
        assert_eq!(progress.status, BatchStatus::Completed);
        assert!(!orchestrator.store().has_failed_rows(&result.batch_id).unwrap());
    }

    #[tokio::test]
    async fn test_partial_failure_then_resume_activates() {
        let fake = Arc::new(FakeDirectory::failing(&["H2"]));
        let orchestrator = orchestrator(&fake);

        let result = orchestrator.process(&two_rows()).await.unwrap();
        assert_eq!(result.processed_hospitals, 1);
        assert_eq!(result.failed_hospitals, 1);
        assert!(!result.batch_activated);
        assert_eq!(result.hospitals[0].status, HospitalStatus::Created);
        assert_eq!(result.hospitals[1].status, HospitalStatus::Failed);
        assert!(result.hospitals[1]
            .error
            .as_deref()
            .unwrap()
            .contains("cannot create H2"));
        assert!(fake.activations().is_empty());

        let batch_id = result.batch_id;
        let pending = orchestrator.store().failed_rows(&batch_id).unwrap();
        assert_eq!(pending, vec![HospitalRow::new(2, "H2", "A2")]);

        let progress = orchestrator.get_progress(&batch_id).unwrap();
        assert_eq!((progress.processed, progress.failed), (2, 1));
        assert_eq!(progress.status, BatchStatus::CompletedWithErrors);

        fake.fail(&[]);
        let resumed = orchestrator.resume(&batch_id).await.unwrap();

        assert_eq!(resumed.retried, 1);
        assert_eq!(resumed.success, 1);
        assert_eq!(resumed.failed, 0);
        assert!(resumed.batch_activated);
        assert_eq!(resumed.results[0].row, 2);
        assert_eq!(resumed.results[0].status, HospitalStatus::CreatedAndActivated);
        assert!(!orchestrator.store().has_failed_rows(&batch_id).unwrap());
        assert_eq!(fake.activations(), vec![batch_id.clone()]);

        // 计数只增不减
        let progress = orchestrator.get_progress(&batch_id).unwrap();
        assert_eq!((progress.processed, progress.failed), (2, 1));
        assert_eq!(progress.status, BatchStatus::Completed);
    }

    #[tokio::test]
    async fn test_resume_keeps_only_still_failing_rows() {
        let fake = Arc::new(FakeDirectory::failing(&["H1", "H2", "H3"]));
        let orchestrator = orchestrator(&fake);
        let rows = vec![
            HospitalRow::new(1, "H1", "A1"),
            HospitalRow::new(2, "H2", "A2"),
            HospitalRow::new(3, "H3", "A3"),
        ];

        let result = orchestrator.process(&rows).await.unwrap();
        assert_eq!(result.failed_hospitals, 3);
        assert!(result.hospitals.iter().all(|h| h.is_failed()));

        fake.fail(&["H3"]);
        let resumed = orchestrator.resume(&result.batch_id).await.unwrap();
        assert_eq!(resumed.retried, 3);
        assert_eq!((resumed.success, resumed.failed), (2, 1));
        assert!(!resumed.batch_activated);
        assert!(resumed
            .results
            .iter()
            .all(|r| r.status != HospitalStatus::CreatedAndActivated));

        let pending: Vec<u32> = orchestrator
            .store()
            .failed_rows(&result.batch_id)
            .unwrap()
            .iter()
            .map(|r| r.row)
            .collect();
        assert_eq!(pending, vec![3]);
        assert_eq!(
            orchestrator.get_progress(&result.batch_id).unwrap().status,
            BatchStatus::CompletedWithErrors
        );

        fake.fail(&[]);
        let resumed = orchestrator.resume(&result.batch_id).await.unwrap();
        assert_eq!(resumed.retried, 1);
        assert!(resumed.batch_activated);
        assert_eq!(fake.activations().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_without_failures_is_rejected_repeatably() {
        let fake = Arc::new(FakeDirectory::default());
        let orchestrator = orchestrator(&fake);

        let err = orchestrator.resume("unknown-batch").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Batch(BatchError::NothingToResume { .. })
        ));
        assert_eq!(err.to_string(), "No failed rows available for resume");
        assert!(orchestrator.get_progress("unknown-batch").is_err());

        let result = orchestrator.process(&two_rows()).await.unwrap();
        let before = orchestrator.get_progress(&result.batch_id).unwrap();
        for _ in 0..2 {
            let err = orchestrator.resume(&result.batch_id).await.unwrap_err();
            assert!(matches!(
                err,
                AppError::Batch(BatchError::NothingToResume { .. })
            ));
        }
        assert_eq!(orchestrator.get_progress(&result.batch_id).unwrap(), before);
        assert_eq!(fake.activations().len(), 1);
        assert_eq!(fake.create_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_activation_failure_is_not_reported_as_activated() {
        let fake = Arc::new(FakeDirectory::default());
        fake.activation_fails.store(true, Ordering::SeqCst);
        let orchestrator = orchestrator(&fake);

        let result = orchestrator.process(&two_rows()).await.unwrap();

        assert_eq!(result.processed_hospitals, 2);
        assert!(!result.batch_activated);
        assert!(result
            .hospitals
            .iter()
            .all(|h| h.status == HospitalStatus::Created));
        assert_eq!(
            orchestrator.get_progress(&result.batch_id).unwrap().status,
            BatchStatus::CompletedWithErrors
        );
    }

    #[tokio::test]
    async fn test_resume_activation_failure_is_not_reported_as_activated() {
        let fake = Arc::new(FakeDirectory::failing(&["H2"]));
        let orchestrator = orchestrator(&fake);

        let result = orchestrator.process(&two_rows()).await.unwrap();
        let batch_id = result.batch_id;
        assert!(!result.batch_activated);

        fake.fail(&[]);
        fake.activation_fails.store(true, Ordering::SeqCst);
        let resumed = orchestrator.resume(&batch_id).await.unwrap();

        assert_eq!((resumed.success, resumed.failed), (1, 0));
        assert!(!resumed.batch_activated);
        assert_eq!(resumed.results[0].status, HospitalStatus::Created);
        assert!(fake.activations().is_empty());
        assert_eq!(
            orchestrator.get_progress(&batch_id).unwrap().status,
            BatchStatus::CompletedWithErrors
        );

        // 待重试集合已清空，再次续跑无事可做
        assert!(!orchestrator.store().has_failed_rows(&batch_id).unwrap());
        let err = orchestrator.resume(&batch_id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Batch(BatchError::NothingToResume { .. })
        ));
    }

    #[tokio::test]
    async fn test_panicking_row_fails_alone() {
        let fake = Arc::new(FakeDirectory::default());
        fake.panicking_names.lock().unwrap().insert("H2".to_string());
        let orchestrator = orchestrator(&fake);
        let rows = vec![
            HospitalRow::new(1, "H1", "A1"),
            HospitalRow::new(2, "H2", "A2"),
            HospitalRow::new(3, "H3", "A3"),
        ];

        let result = orchestrator.process(&rows).await.unwrap();

        assert_eq!(result.processed_hospitals, 2);
        assert_eq!(result.failed_hospitals, 1);
        assert!(!result.batch_activated);
        assert_eq!(result.hospitals[0].status, HospitalStatus::Created);
        assert_eq!(result.hospitals[1].status, HospitalStatus::Failed);
        assert!(result.hospitals[1]
            .error
            .as_deref()
            .unwrap()
            .contains("row task failed"));
        assert_eq!(result.hospitals[2].status, HospitalStatus::Created);

        let pending = orchestrator.store().failed_rows(&result.batch_id).unwrap();
        assert_eq!(pending, vec![HospitalRow::new(2, "H2", "A2")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_row_backoff_does_not_delay_siblings() {
        let flaky = Arc::new(FlakyDirectory {
            retry: RetryPolicy::default(),
            flaky_name: "H2".to_string(),
            started: TestInstant::now(),
            attempts: Mutex::new(HashMap::new()),
            finished: Mutex::new(HashMap::new()),
        });
        let api: Arc<dyn HospitalApi> = flaky.clone();
        let orchestrator = BatchOrchestrator::new(api, Arc::new(InMemoryBatchStore::new()));

        let result = orchestrator.process(&two_rows()).await.unwrap();

        assert!(result.batch_activated);
        assert!(result
            .hospitals
            .iter()
            .all(|h| h.status == HospitalStatus::CreatedAndActivated));

        // H2 退避 2s + 4s，H1 不受影响
        let finished = flaky.finished.lock().unwrap();
        assert_eq!(finished["H1"], Duration::ZERO);
        assert_eq!(finished["H2"], Duration::from_secs(6));
        assert_eq!(flaky.attempts.lock().unwrap()["H2"], 3);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let fake = Arc::new(FakeDirectory::default());
        let err = orchestrator(&fake).process(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::Batch(BatchError::EmptyBatch)));
    }

    #[tokio::test]
    async fn test_unknown_progress_not_found() {
        let fake = Arc::new(FakeDirectory::default());
        let err = orchestrator(&fake).get_progress("nope").unwrap_err();
        assert_eq!(err.to_string(), "Batch not found");
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_rows_are_created_concurrently() {
        let rows: Vec<HospitalRow> = (1..=20)
            .map(|i| HospitalRow::new(i, format!("H{i}"), format!("A{i}")))
            .collect();
        // 所有行必须同时在途，屏障才会放行
        let fake = Arc::new(FakeDirectory {
            barrier: Some(Barrier::new(rows.len())),
            ..FakeDirectory::default()
        });
        let orchestrator = orchestrator(&fake);

        let result = tokio::time::timeout(Duration::from_secs(5), orchestrator.process(&rows))
            .await
            .expect("rows were not fanned out concurrently")
            .unwrap();

        assert_eq!(result.processed_hospitals, 20);
        let order: Vec<u32> = result.hospitals.iter().map(|h| h.row).collect();
        assert_eq!(order, (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_each_pass_mints_distinct_batch_id() {
        let fake = Arc::new(FakeDirectory::default());
        let orchestrator = orchestrator(&fake);

        let first = orchestrator.process(&two_rows()).await.unwrap();
        let second = orchestrator.process(&two_rows()).await.unwrap();
        assert_ne!(first.batch_id, second.batch_id);
    }
}
