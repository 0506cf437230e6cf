pub mod config;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod plot;
pub mod query;
pub mod table;
pub mod timestamp;
