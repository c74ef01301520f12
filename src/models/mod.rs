pub mod batch;
pub mod hospital;
pub mod loaders;

pub use batch::{BatchProgress, BatchResult, BatchStatus, ResumeResult};
pub use hospital::{
    CreateHospitalPayload, CreatedHospital, HospitalResult, HospitalRow, HospitalStatus,
};
pub use loaders::{parse_and_validate_csv, validate_csv_only, CsvValidationReport, RowIssue};
