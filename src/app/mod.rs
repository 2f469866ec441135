pub mod market;

pub use market::{standard_registry, MarketEtl};
