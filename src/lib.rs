//! Race finishing-order prediction from session timing, weather and static
//! track knowledge.

pub mod config;
pub mod error;
pub mod features;
pub mod imputer;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod trainer;
pub mod types;
pub mod weather;
