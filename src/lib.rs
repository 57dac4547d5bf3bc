//! Client for the SheepIt render farm's web upload workflow.
//!
//! The farm has no API; submitting a job means scripting its multi-step HTML
//! form flow: log in, request an upload token from the get-started page,
//! upload the project archive, then scrape the step-2 configuration page and
//! post the assembled job settings. This crate does exactly that and nothing
//! more: one attempt per call, errors surfaced immediately, sessions handed
//! to the caller as a plain cookie map for persistence.

pub mod client;
pub mod error;
pub mod job;
pub mod scrape;

pub use client::{Client, ProgressFn, BASE_URL};
pub use error::{Error, Result};
pub use job::{ComputeMethod, JobKind, JobOptions, JobPage, EEVEE_ENGINE};
