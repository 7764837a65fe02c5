// src/lib.rs

//! Pitwall: fetches Formula 1 standings, rosters and telemetry from public
//! APIs and publishes them to a static TypeScript artifact and a document
//! store.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
