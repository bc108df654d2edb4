//! FOYER invitation gateway server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod config;
pub mod db;
pub mod invite;
pub mod routes;
pub mod state;
