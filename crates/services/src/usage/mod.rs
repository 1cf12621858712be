pub mod ports;
pub mod service;

pub use ports::{UsageError, UsageReceipt, UsageService};
pub use service::UsageServiceImpl;
