pub mod api;
pub mod config;
pub mod controller;
pub mod demo_api;
pub mod format;
pub mod http_client;
pub mod provider;
pub mod state;
pub mod ui;
