//! # Hospital Bulk
//!
//! 批量创建医院并在全部成功后激活批次的 Rust 应用程序
//!
//! ## 架构设计
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 唯一访问网络的层
//! - `HospitalApi` - 目录服务能力（创建医院、激活批次）
//! - `RetryPolicy` - 有界重试 + 指数退避，每次调用独立计数
//!
//! ### ② 存储层（Store）
//! - `store/` - 批次进度与待重试行的键值存储
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 首轮处理、续跑、激活决策
//! - `orchestrator/row_processor` - 每行并发创建并按顺序汇总
//!
//! ### ④ 输入（Models）
//! - `models/loaders` - CSV 解析与校验，产出 `HospitalRow`
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod utils;

// 重新导出常用类型
pub use app::App;
pub use clients::{HospitalApi, HospitalApiClient, RetryPolicy};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{
    BatchProgress, BatchResult, BatchStatus, HospitalResult, HospitalRow, HospitalStatus,
    ResumeResult,
};
pub use orchestrator::BatchOrchestrator;
pub use store::{BatchStore, InMemoryBatchStore};
