//! Wallet signature authentication server
//!
//! Clients prove control of an Ethereum-style address by signing a
//! server-issued nonce with `personal_sign`. A verified signature opens a
//! session that gates the profile actions.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod profile;
pub mod routes;
pub mod state;
pub mod store;
