pub mod api;
pub mod app;
pub mod checks;
pub mod config;
pub mod differ;
pub mod errors;
pub mod extract;
pub mod hash;
pub mod manifest;
pub mod pipeline;
pub mod provider;
pub mod resolver;
pub mod review;
pub mod telemetry;
pub mod transport;
pub mod vcs;
