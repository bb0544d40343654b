// Application layer: configuration, the per-report event adapter and the
// resolve -> extract -> partition -> assign -> enrich pipeline.

pub mod config;
pub mod error;
pub mod extract;
pub mod reporting;
pub mod service;

pub use config::*;
pub use error::*;
pub use extract::*;
pub use reporting::*;
pub use service::*;
