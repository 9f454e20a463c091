//! MEP directory and advocacy email drafting.
pub mod campaign;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod db;
pub mod directory;
pub mod filter;
pub mod locale;
pub mod model;
pub mod render;
pub mod session;
pub mod store;
pub mod wizard;
