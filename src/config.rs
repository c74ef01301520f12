use crate::error::{AppError, AppResult, ConfigError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 医院目录服务地址
    pub api_base_url: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 每次远程调用的最大尝试次数
    pub max_retries: u32,
    /// 退避时间单位（毫秒），第 k 次失败后等待 2^k 个单位
    pub backoff_base_ms: u64,
    /// 单批最多行数
    pub max_batch_rows: usize,
    /// 首轮处理后自动续跑的轮数
    pub auto_resume_rounds: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://hospital-directory.onrender.com".to_string(),
            request_timeout_secs: 10,
            max_retries: 3,
            backoff_base_ms: 1000,
            max_batch_rows: 20,
            auto_resume_rounds: 0,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量加载（缺省值来自 `Default`）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，文件中缺失的字段使用默认值
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        toml::from_str(&content).map_err(|e| {
            AppError::Config(ConfigError::FileParseFailed {
                path: path.display().to_string(),
                source: e,
            })
        })
    }

    /// 加载配置：`HOSPITAL_BULK_CONFIG` 指向的文件（若存在）+ 环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var("HOSPITAL_BULK_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        Self {
            api_base_url: std::env::var("HOSPITAL_API_BASE_URL").unwrap_or(self.api_base_url),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS")
                .unwrap_or(self.request_timeout_secs),
            max_retries: env_parse("MAX_RETRIES").unwrap_or(self.max_retries),
            backoff_base_ms: env_parse("BACKOFF_BASE_MS").unwrap_or(self.backoff_base_ms),
            max_batch_rows: env_parse("MAX_BATCH_ROWS").unwrap_or(self.max_batch_rows),
            auto_resume_rounds: env_parse("AUTO_RESUME_ROUNDS")
                .unwrap_or(self.auto_resume_rounds),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_directory_service() {
        let config = Config::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_batch_rows, 20);
        assert_eq!(config.backoff_unit(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            api_base_url = "http://localhost:9000"
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff_base_ms, 1000);
        assert_eq!(config.output_log_file, "output.txt");
    }
}
