pub mod allocator;
pub mod config;
pub mod consensus;
pub mod error;
pub mod filters;
pub mod gather;
pub mod metadata;
pub mod recommend;
pub mod scoring;

#[cfg(test)]
mod config_tests;

pub use allocator::*;
pub use config::*;
pub use consensus::*;
pub use error::*;
pub use filters::*;
pub use gather::*;
pub use metadata::*;
pub use recommend::*;
pub use scoring::*;
