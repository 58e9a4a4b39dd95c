pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod mcp;
pub mod model;
pub mod models;
pub mod routes;
pub mod utils;
