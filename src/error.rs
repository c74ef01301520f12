//! 错误类型
//!
//! 错误信息会原样返回给调用方（例如写进 `HospitalResult.error`），
//! 因此 Display 文本保持与目录服务接口一致的英文表述。

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 远程目录服务调用错误
    #[error(transparent)]
    Api(#[from] ApiError),
    /// CSV 结构校验错误
    #[error(transparent)]
    Validation(#[from] CsvValidationError),
    /// 批次编排错误（无可续跑行、批次不存在等）
    #[error(transparent)]
    Batch(#[from] BatchError),
    /// 状态存储错误
    #[error(transparent)]
    Store(#[from] StoreError),
    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error(transparent)]
    File(#[from] FileError),
}

/// 远程 API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败（连接、超时等）
    #[error("request to {endpoint} failed: {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: BoxError,
    },
    /// 服务返回非成功状态码
    #[error("{endpoint} returned {status}: {body}")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// 响应体解析失败
    #[error("invalid response from {endpoint}: {source}")]
    JsonParseFailed {
        endpoint: String,
        #[source]
        source: BoxError,
    },
    /// 重试次数耗尽，携带最后一次失败原因
    #[error("External API failed after retries: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last_error: Box<ApiError>,
    },
}

/// CSV 校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsvValidationError {
    #[error("CSV must contain name and address columns")]
    MissingColumns,
    #[error("CSV is empty")]
    Empty,
    #[error("CSV exceeds {max} hospital limit")]
    TooManyRows { max: usize },
    #[error("Row {row} missing required fields")]
    MissingFields { row: u32 },
    #[error("CSV could not be parsed: {0}")]
    Malformed(String),
}

/// 批次编排错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// 该批次没有待重试的行
    #[error("No failed rows available for resume")]
    NothingToResume { batch_id: String },
    /// 批次不存在
    #[error("Batch not found")]
    NotFound { batch_id: String },
    /// 空批次
    #[error("batch must contain at least one row")]
    EmptyBatch,
}

/// 状态存储错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// 存储不可用（锁中毒等），视为致命错误
    #[error("batch store unavailable: {0}")]
    Unavailable(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config file {path}: {source}")]
    FileParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 是否属于调用方可见的拒绝（对应 4xx 语义）
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::Batch(_))
    }
}

impl ApiError {
    /// 创建网络请求失败错误
    pub fn request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }

    /// 创建响应解析失败错误
    pub fn json_parse_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ApiError::JsonParseFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
