pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod http;
pub mod index;
pub mod model;
pub mod ranking;
pub mod recommender;
pub mod scoring;
pub mod server;
