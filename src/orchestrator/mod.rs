//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批次处理器
//! - 生成批次 ID、登记进度
//! - 首轮处理与续跑两个协议
//! - 决定是否激活批次
//! - 唯一写入 `BatchStore` 的模块
//!
//! ### `row_processor` - 单行处理器
//! - 每行一个任务并发创建，等待全部结束
//! - 按提交顺序划分成功/失败
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理一个批次)
//!     ↓
//! row_processor (处理 Vec<HospitalRow>)
//!     ↓
//! clients::HospitalApi (单次远程调用 + 重试)
//! ```

pub mod batch_processor;
pub mod row_processor;

pub use batch_processor::BatchOrchestrator;
pub use row_processor::{RowOutcome, RowPartition};
