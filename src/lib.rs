pub mod config;
pub mod ensemble;
pub mod error;
pub mod fake_source;
pub mod features;
pub mod gamelog;
pub mod http_cache;
pub mod http_client;
pub mod mlp;
pub mod pipeline;
pub mod report;
pub mod roster;
pub mod stats_api;
pub mod train;
pub mod tree;
