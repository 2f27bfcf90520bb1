//! Trip generation pipeline
//!
//! Accepts trip requests as background jobs, generates one packing list per
//! traveler with Cloudflare Workers AI, and persists the resulting trip.
//! Jobs are retried on timeouts and transient failures, monitored for stuck
//! processing, and swept once they age out.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
