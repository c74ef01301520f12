//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数

use crate::config::Config;
use anyhow::Result;
use std::fs;
use tracing::info;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n医院批量导入日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 追加一段内容到日志文件
pub fn append_log_file(log_file_path: &str, content: &str) -> Result<()> {
    use std::io::Write;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(file, "{}", content)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 医院批量导入");
    info!("🌐 目录服务: {}", config.api_base_url);
    info!(
        "🔁 最大尝试次数: {} | 退避单位: {}ms",
        config.max_retries, config.backoff_base_ms
    );
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_id`: 批次 ID
/// - `total`: 本批行数
pub fn log_batch_start(batch_id: &str, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理批次 {}", batch_id);
    info!("📄 本批医院: {} 个，全部并发创建", total);
    info!("{}", "=".repeat(60));
}

/// 记录一轮处理完成信息
///
/// # 参数
/// - `batch_id`: 批次 ID
/// - `success`: 本轮成功数量
/// - `failed`: 本轮失败数量
/// - `activated`: 本轮是否激活了批次
pub fn log_batch_complete(batch_id: &str, success: usize, failed: usize, activated: bool) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 批次 {} 本轮完成: 成功 {}/{}",
        batch_id,
        success,
        success + failed
    );
    if activated {
        info!("✅ 批次已激活");
    } else {
        info!("⏸️ 批次未激活");
    }
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `created`: 累计创建成功数量
/// - `failed`: 仍失败数量
/// - `total`: 总数
/// - `activated`: 批次是否已激活
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(
    created: usize,
    failed: usize,
    total: usize,
    activated: bool,
    log_file_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", created, total);
    info!("❌ 失败: {}", failed);
    info!("🔓 已激活: {}", if activated { "是" } else { "否" });
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("abcdefgh", 3), "abc...");
    }
}
