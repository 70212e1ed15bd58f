pub mod chart;
pub mod config;
pub mod fetch;
pub mod infra;
pub mod metrics;
pub mod output;
pub mod parser;
pub mod population;
pub mod series;
pub mod services;
