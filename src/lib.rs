pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod geocoding;
pub mod profiles;
pub mod routes;
pub mod state;
