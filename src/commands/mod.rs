pub mod apply;
pub mod config;
pub mod handlers;
pub mod show;
