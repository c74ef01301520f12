//! 单行处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **并发扇出**：每一行一个 tokio 任务，全部发起，不限流
//! 2. **失败隔离**：某行失败不会取消其他行，等待全部结束
//! 3. **结果划分**：按提交顺序把结果分成成功/失败（纯函数）

use crate::clients::HospitalApi;
use crate::models::{HospitalResult, HospitalRow};
use crate::utils::logging::truncate_text;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 单行最终结果：成功返回医院 ID，失败返回错误信息
pub type RowOutcome = Result<i64, String>;

/// 并发创建所有行，返回与 `rows` 顺序一致的结果
///
/// # 参数
/// - `api`: 目录服务（每次调用自带重试）
/// - `rows`: 本轮要创建的行
/// - `batch_id`: 批次 ID，写入每个 payload 的 `creation_batch_id`
pub async fn create_rows(
    api: &Arc<dyn HospitalApi>,
    rows: &[HospitalRow],
    batch_id: &str,
) -> Vec<RowOutcome> {
    let handles: Vec<_> = rows
        .iter()
        .map(|row| {
            let api = Arc::clone(api);
            let payload = row.to_payload(batch_id);
            let row_index = row.row;
            let batch_id = batch_id.to_string();

            tokio::spawn(async move {
                match api.create_hospital(&payload).await {
                    Ok(created) => {
                        info!(
                            "[批次 {}] ✓ 第 {} 行创建成功: {} (ID: {})",
                            batch_id, row_index, payload.name, created.id
                        );
                        Ok(created.id)
                    }
                    Err(e) => {
                        warn!(
                            "[批次 {}] ❌ 第 {} 行创建失败: {}",
                            batch_id,
                            row_index,
                            truncate_text(&e.to_string(), 200)
                        );
                        Err(e.to_string())
                    }
                }
            })
        })
        .collect();

    // 等待所有任务结束，不因某一行失败提前退出
    join_all(handles)
        .await
        .into_iter()
        .zip(rows)
        .map(|(joined, row)| {
            joined.unwrap_or_else(|e| {
                error!("[批次 {}] 第 {} 行任务执行失败: {}", batch_id, row.row, e);
                Err(format!("row task failed: {}", e))
            })
        })
        .collect()
}

/// 一轮处理的划分结果
#[derive(Debug, Default)]
pub struct RowPartition {
    /// 与输入顺序一致的逐行结果
    pub results: Vec<HospitalResult>,
    pub succeeded: usize,
    /// 本轮仍失败的行，保持输入顺序
    pub failed_rows: Vec<HospitalRow>,
}

impl RowPartition {
    pub fn failed(&self) -> usize {
        self.failed_rows.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_rows.is_empty()
    }
}

/// 按提交顺序把结果划分为成功/失败
pub fn partition(rows: &[HospitalRow], outcomes: Vec<RowOutcome>) -> RowPartition {
    let mut partition = RowPartition::default();

    for (row, outcome) in rows.iter().zip(outcomes) {
        match outcome {
            Ok(hospital_id) => {
                partition.succeeded += 1;
                partition.results.push(HospitalResult::created(row, hospital_id));
            }
            Err(message) => {
                partition.results.push(HospitalResult::failed(row, message));
                partition.failed_rows.push(row.clone());
            }
        }
    }

    partition
}
