//! webanalytics - web traffic analytics collector
//!
//! Records one fact row per eligible HTTP request, deduplicating the shared
//! attributes (URL, user agent, browser, OS, device, IP, referrer) into
//! dimension tables, and accepts batches of browser performance entries.
//!
//! # Architecture
//! - `tracking`: dimension resolver, UA classifier, request pipeline, performance ingestion
//! - `storage`: SeaORM backend and the storage traits the core depends on
//! - `api`: tracking middleware and ingestion / health endpoints
//! - `config`: static configuration (TOML + `WA__` environment overrides)
//! - `runtime`: startup wiring, server mode and one-shot commands
//! - `system`: logging

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod storage;
pub mod system;
pub mod tracking;
pub mod utils;
