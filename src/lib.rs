// Library exports for Folio
// This allows integration tests to build the router against a scratch database

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod markdown;
pub mod organizer;
pub mod posts;
pub mod routes;
pub mod state;
