pub mod app;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod state;
