//! 批次级别的数据结构：进度、首轮结果、续跑结果

use super::hospital::HospitalResult;
use serde::{Deserialize, Serialize};

/// 批次状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Completed,
    CompletedWithErrors,
}

/// 批次进度
///
/// 计数器只增不减：续跑成功的行不会回退 `failed`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub status: BatchStatus,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            failed: 0,
            status: BatchStatus::Processing,
        }
    }
}

/// 首轮处理的汇总结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: String,
    pub total_hospitals: usize,
    /// 成功创建的数量
    pub processed_hospitals: usize,
    pub failed_hospitals: usize,
    pub processing_time_seconds: f64,
    pub batch_activated: bool,
    pub hospitals: Vec<HospitalResult>,
}

/// 续跑的汇总结果，计数只针对本轮
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeResult {
    pub batch_id: String,
    pub retried: usize,
    pub success: usize,
    pub failed: usize,
    pub batch_activated: bool,
    pub results: Vec<HospitalResult>,
}
