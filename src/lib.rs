pub mod api_docs;
pub mod app;
pub mod config;
pub mod db;
pub mod entities;
pub mod middleware;
pub mod repositories;
pub mod roster;
pub mod routes;
pub mod utils;
