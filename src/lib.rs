pub mod auth;
pub mod config;
pub mod database;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod inventory;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
