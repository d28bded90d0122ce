// src/core/mod.rs

/// Typed errors of the engine.
pub mod error;

/// Progress events streamed while a scan runs.
pub mod events;

/// JSON export of finished scans.
pub mod export;

/// In-process job queue and the worker that consumes it.
pub mod jobs;

/// Static catalogue of finding codes with explanations and remediation.
pub mod knowledge_base;

/// Data structures shared by the scanners, the store and the front-end.
pub mod models;

/// Runs the scanners of a scan and owns its state machine.
pub mod orchestrator;

/// The scanner contract and the five scanners.
pub mod scanner;

pub mod sink;

pub mod store;
