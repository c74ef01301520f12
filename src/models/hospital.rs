//! 医院记录相关的数据结构

use serde::{Deserialize, Serialize};

/// 经过校验的一行输入
///
/// `row` 是该行在提交批次中的位置（从 1 开始），同一批次内唯一。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalRow {
    pub row: u32,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

impl HospitalRow {
    pub fn new(row: u32, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            row,
            name: name.into(),
            address: address.into(),
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// 构建创建请求的 payload
    pub fn to_payload(&self, batch_id: &str) -> CreateHospitalPayload {
        CreateHospitalPayload {
            name: self.name.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            creation_batch_id: batch_id.to_string(),
        }
    }
}

/// `POST /hospitals/` 请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHospitalPayload {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub creation_batch_id: String,
}

/// 目录服务创建成功后的响应，只关心 `id`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedHospital {
    pub id: i64,
}

/// 单行处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HospitalStatus {
    Created,
    CreatedAndActivated,
    Failed,
}

/// 单行处理结果
///
/// `error` 仅在 `status == Failed` 时存在。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalResult {
    pub row: u32,
    pub name: String,
    pub hospital_id: Option<i64>,
    pub status: HospitalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HospitalResult {
    pub fn created(row: &HospitalRow, hospital_id: i64) -> Self {
        Self {
            row: row.row,
            name: row.name.clone(),
            hospital_id: Some(hospital_id),
            status: HospitalStatus::Created,
            error: None,
        }
    }

    pub fn failed(row: &HospitalRow, error: impl Into<String>) -> Self {
        Self {
            row: row.row,
            name: row.name.clone(),
            hospital_id: None,
            status: HospitalStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == HospitalStatus::Failed
    }
}
