//! Integral Exterior lead intake API.
//!
//! Receives quote requests from the website contact form and appends them
//! to an Azure Table Storage table.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Lead submission and record types.
//! - `routes`: Router assembly and shared response headers.
//! - `scoring`: Estimated value and priority derivation.
//! - `storage`: Storage capability and in-memory store.
//! - `table_client`: Azure Table Storage REST client.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod scoring;
pub mod storage;
pub mod table_client;
