pub mod actions;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod export;
pub mod logs;
pub mod platform;
pub mod probe;
pub mod ui;
