use std::sync::Arc;

pub mod actor;
pub mod cloud_provider;
pub mod config;
pub mod digitalocean;
pub mod refresher;

pub type AppConfig = Arc<config::Config>;
