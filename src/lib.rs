pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
