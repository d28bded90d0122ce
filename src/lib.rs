// src/lib.rs

//! Website scanning engine: five scanners (DNS, TLS, performance, security headers, SEO)
//! driven by an orchestrator that streams progress events and persists module results.

pub mod config;
pub mod core;
pub mod logging;
