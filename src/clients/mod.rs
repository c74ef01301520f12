pub mod hospital_client;
pub mod retry;

pub use hospital_client::{HospitalApi, HospitalApiClient};
pub use retry::RetryPolicy;
