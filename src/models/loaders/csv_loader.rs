use crate::error::{AppError, AppResult, CsvValidationError};
use crate::models::hospital::HospitalRow;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::path::Path;
use tokio::fs;

const NAME_COLUMN: &str = "name";
const ADDRESS_COLUMN: &str = "address";
const PHONE_COLUMN: &str = "phone";

/// 读取 CSV 文件内容
pub async fn load_csv_file(csv_file_path: &Path) -> AppResult<String> {
    let content = fs::read_to_string(csv_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(csv_file_path.display().to_string(), e))?;
    tracing::info!(
        "正在加载: {}",
        csv_file_path.file_name().unwrap_or_default().to_string_lossy()
    );
    Ok(content)
}

/// 列索引
struct Columns {
    name: usize,
    address: usize,
    phone: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Option<Self> {
        let position = |column: &str| headers.iter().position(|h| h.trim() == column);
        Some(Self {
            name: position(NAME_COLUMN)?,
            address: position(ADDRESS_COLUMN)?,
            phone: position(PHONE_COLUMN),
        })
    }

    fn field<'r>(record: &'r StringRecord, index: usize) -> &'r str {
        record.get(index).map(str::trim).unwrap_or_default()
    }

    fn name<'r>(&self, record: &'r StringRecord) -> &'r str {
        Self::field(record, self.name)
    }

    fn address<'r>(&self, record: &'r StringRecord) -> &'r str {
        Self::field(record, self.address)
    }

    fn phone(&self, record: &StringRecord) -> Option<String> {
        self.phone
            .map(|index| Self::field(record, index))
            .filter(|phone| !phone.is_empty())
            .map(str::to_string)
    }
}

/// 读取表头和全部记录
fn read_records(contents: &str) -> Result<(StringRecord, Vec<StringRecord>), CsvValidationError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(contents.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| CsvValidationError::Malformed(e.to_string()))?
        .clone();

    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CsvValidationError::Malformed(e.to_string()))?;

    Ok((headers, records))
}

/// 解析并校验 CSV，任何结构问题都会拒绝整份输入
///
/// # 参数
/// - `contents`: CSV 文本（首行为表头）
/// - `max_rows`: 单批最多行数
///
/// # 返回
/// 按提交顺序排列、行号从 1 开始的 `HospitalRow` 列表
pub fn parse_and_validate_csv(
    contents: &str,
    max_rows: usize,
) -> Result<Vec<HospitalRow>, CsvValidationError> {
    let (headers, records) = read_records(contents)?;
    let columns = Columns::locate(&headers).ok_or(CsvValidationError::MissingColumns)?;

    if records.is_empty() {
        return Err(CsvValidationError::Empty);
    }

    if records.len() > max_rows {
        return Err(CsvValidationError::TooManyRows { max: max_rows });
    }

    records
        .iter()
        .zip(1u32..)
        .map(|(record, row)| {
            let name = columns.name(record);
            let address = columns.address(record);
            if name.is_empty() || address.is_empty() {
                return Err(CsvValidationError::MissingFields { row });
            }
            Ok(HospitalRow {
                row,
                name: name.to_string(),
                address: address.to_string(),
                phone: columns.phone(record),
            })
        })
        .collect()
}

/// 校验报告中的一条问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RowIssue {
    /// 整份文件级别的问题
    General(String),
    /// 某一行的问题
    Row { row: u32, errors: Vec<String> },
}

/// 仅校验、不处理时返回的报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvValidationReport {
    pub valid: bool,
    pub errors: Vec<RowIssue>,
    pub total_rows: usize,
    pub valid_rows: usize,
}

impl CsvValidationReport {
    fn rejected(message: impl Into<String>, total_rows: usize) -> Self {
        Self {
            valid: false,
            errors: vec![RowIssue::General(message.into())],
            total_rows,
            valid_rows: 0,
        }
    }
}

/// 校验 CSV 但不触发任何处理，逐行收集问题
pub fn validate_csv_only(contents: &str, max_rows: usize) -> CsvValidationReport {
    let (headers, records) = match read_records(contents) {
        Ok(parsed) => parsed,
        Err(e) => return CsvValidationReport::rejected(e.to_string(), 0),
    };

    if headers.is_empty() {
        return CsvValidationReport::rejected("CSV has no headers", 0);
    }

    let Some(columns) = Columns::locate(&headers) else {
        let message = CsvValidationError::MissingColumns.to_string();
        return CsvValidationReport::rejected(message, 0);
    };

    let mut errors = Vec::new();
    let mut valid_rows = 0usize;

    for (record, row) in records.iter().zip(1u32..) {
        let mut row_errors = Vec::new();
        if columns.name(record).is_empty() {
            row_errors.push("Missing name".to_string());
        }
        if columns.address(record).is_empty() {
            row_errors.push("Missing address".to_string());
        }

        if row_errors.is_empty() {
            valid_rows += 1;
        } else {
            errors.push(RowIssue::Row {
                row,
                errors: row_errors,
            });
        }
    }

    if valid_rows > max_rows {
        return CsvValidationReport::rejected(
            format!("CSV exceeds maximum limit of {} hospitals", max_rows),
            valid_rows,
        );
    }

    CsvValidationReport {
        valid: errors.is_empty(),
        total_rows: valid_rows + errors.len(),
        errors,
        valid_rows,
    }
}
