pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod sources;
pub mod storage;

#[cfg(test)]
pub mod test_support;
