pub mod aggregate;
pub mod config;
pub mod error;
pub mod explorer;
pub mod fetch;
pub mod process;
pub mod report;

#[cfg(test)]
mod test_support;

pub use config::Settings;
pub use error::{AcquisitionError, Error, Result};
pub use explorer::{Dashboard, Explorer, Status};
pub use process::{RecordTable, Value};
