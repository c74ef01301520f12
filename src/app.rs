use crate::config::Config;
use crate::models::{self, BatchResult, HospitalStatus};
use crate::orchestrator::BatchOrchestrator;
use crate::utils::logging;
use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: BatchOrchestrator,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)
            .with_context(|| format!("无法初始化日志文件: {}", config.output_log_file))?;

        logging::log_startup(&config);

        let orchestrator = BatchOrchestrator::from_config(&config)?;

        Ok(Self {
            config,
            orchestrator,
        })
    }

    /// 只校验 CSV，输出校验报告
    pub async fn validate(&self, csv_path: &Path) -> Result<()> {
        let contents = models::loaders::load_csv_file(csv_path).await?;
        let report = models::validate_csv_only(&contents, self.config.max_batch_rows);

        if report.valid {
            info!("✓ CSV 校验通过，共 {} 行", report.valid_rows);
        } else {
            warn!("⚠️ CSV 校验未通过");
        }

        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    /// 运行应用主逻辑：校验 → 首轮处理 → 自动续跑
    pub async fn run(&self, csv_path: &Path) -> Result<()> {
        let contents = models::loaders::load_csv_file(csv_path).await?;
        let rows = match models::parse_and_validate_csv(&contents, self.config.max_batch_rows) {
            Ok(rows) => rows,
            Err(e) => {
                error!("❌ CSV 校验失败: {}", e);
                return Err(e.into());
            }
        };

        info!("✓ 找到 {} 家待创建的医院", rows.len());

        let result = self.orchestrator.process(&rows).await?;
        self.record(&json!({ "pass": "process", "result": &result }))?;

        let mut created = result.processed_hospitals;
        let mut failed = result.failed_hospitals;
        let mut activated = result.batch_activated;

        for round in 1..=self.config.auto_resume_rounds {
            if !self.orchestrator.store().has_failed_rows(&result.batch_id)? {
                break;
            }

            info!("🔁 第 {}/{} 轮自动续跑", round, self.config.auto_resume_rounds);
            let resumed = self.orchestrator.resume(&result.batch_id).await?;
            self.record(&json!({ "pass": "resume", "round": round, "result": &resumed }))?;

            created += resumed.success;
            failed = resumed.failed;
            activated = resumed.batch_activated;
        }

        let progress = self.orchestrator.get_progress(&result.batch_id)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "batch": summarize(&result),
                "progress": progress,
            }))?
        );

        logging::print_final_stats(
            created,
            failed,
            result.total_hospitals,
            activated,
            &self.config.output_log_file,
        );

        Ok(())
    }

    /// 把一轮结果写入日志文件
    fn record(&self, value: &serde_json::Value) -> Result<()> {
        logging::append_log_file(
            &self.config.output_log_file,
            &serde_json::to_string_pretty(value)?,
        )
    }
}

fn summarize(result: &BatchResult) -> serde_json::Value {
    let failed_rows: Vec<u32> = result
        .hospitals
        .iter()
        .filter(|h| h.status == HospitalStatus::Failed)
        .map(|h| h.row)
        .collect();

    json!({
        "batch_id": result.batch_id,
        "total_hospitals": result.total_hospitals,
        "processed_hospitals": result.processed_hospitals,
        "failed_hospitals": result.failed_hospitals,
        "processing_time_seconds": result.processing_time_seconds,
        "batch_activated": result.batch_activated,
        "initially_failed_rows": failed_rows,
    })
}
