pub mod csv_loader;

pub use csv_loader::{
    load_csv_file, parse_and_validate_csv, validate_csv_only, CsvValidationReport, RowIssue,
};
