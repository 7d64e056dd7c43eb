pub mod alert_engine;
pub mod analytics;
pub mod api;
pub mod binance;
pub mod config;
pub mod error;
pub mod event;
pub mod indicator;
pub mod model;
pub mod pipeline;
pub mod sampler;
