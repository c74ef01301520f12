//! 医院目录服务客户端
//!
//! 封装所有与目录服务相关的调用逻辑，是唯一访问网络的组件。
//! 每次调用都经过 `RetryPolicy` 包装。

use crate::clients::retry::RetryPolicy;
use crate::config::Config;
use crate::error::{ApiError, AppResult, ConfigError};
use crate::models::{CreateHospitalPayload, CreatedHospital};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// 目录服务能力
///
/// 编排层只依赖这个 trait，测试时可以替换为内存实现。
#[async_trait]
pub trait HospitalApi: Send + Sync {
    /// 创建一家医院，返回服务端分配的 id
    async fn create_hospital(
        &self,
        payload: &CreateHospitalPayload,
    ) -> Result<CreatedHospital, ApiError>;

    /// 激活整个批次
    async fn activate_batch(&self, batch_id: &str) -> Result<Value, ApiError>;
}

/// 基于 reqwest 的目录服务客户端
#[derive(Clone)]
pub struct HospitalApiClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HospitalApiClient {
    /// 创建新的客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self::with_client(
            http,
            &config.api_base_url,
            RetryPolicy::from_config(config),
        ))
    }

    /// 使用自定义 HTTP 客户端和重试策略创建
    pub fn with_client(http: Client, base_url: &str, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    /// 发送一次请求并解析 JSON 响应
    ///
    /// 非 2xx 状态码、网络错误、超时、无法解析的响应体都视为一次失败的尝试。
    async fn send_once<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::request_failed(endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::request_failed(endpoint, e))?;

        if !status.is_success() {
            return Err(ApiError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!("{} 响应: {}", endpoint, body);

        // 空响应体按 JSON null 处理
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| ApiError::json_parse_failed(endpoint, e))
    }
}

#[async_trait]
impl HospitalApi for HospitalApiClient {
    async fn create_hospital(
        &self,
        payload: &CreateHospitalPayload,
    ) -> Result<CreatedHospital, ApiError> {
        let url = format!("{}/hospitals/", self.base_url);

        self.retry
            .run("create_hospital", || {
                self.send_once(&url, self.http.post(&url).json(payload))
            })
            .await
    }

    async fn activate_batch(&self, batch_id: &str) -> Result<Value, ApiError> {
        let url = format!("{}/hospitals/batch/{}/activate", self.base_url, batch_id);

        self.retry
            .run("activate_batch", || self.send_once(&url, self.http.patch(&url)))
            .await
    }
}
