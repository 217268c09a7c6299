//! Wayfarer - AI-assisted travel requirements API
//!
//! This crate implements an HTTP backend that turns free-text travel
//! questions into structured requirement reports via Google Gemini, keeps a
//! queryable history of past answers in SQLite, and guards its routes with
//! per-client sliding-window rate limiting.

pub mod advisor;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod ratelimit;
