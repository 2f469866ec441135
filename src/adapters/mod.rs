// Adapters layer: concrete implementations for external systems.

pub mod alphavantage;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

pub use alphavantage::AlphaVantageSource;
pub use local::LocalGateway;
#[cfg(feature = "s3")]
pub use s3::{S3Gateway, S3Settings};
