//! Library crate for bible-games-back, exposing modules for binaries and integration tests.

pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod generation;
pub mod routes;
pub mod services;
pub mod state;
