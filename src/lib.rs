pub mod api;
pub mod app;
pub mod capacity;
pub mod classifier;
pub mod config;
pub mod importers;
pub mod model;
pub mod report;
pub mod services;
pub mod utils;
