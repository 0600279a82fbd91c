/// Extractive question-answering scorer.
///
/// This module provides a blocking client for a hosted extractive QA model,
/// including error handling, retry logic, and timeout configuration. The
/// client is built once and shared for the lifetime of the process.
mod client;

pub use client::{HfQaClient, HfQaClientBuilder, ScoredSpan, ScorerClientTrait, ScoringError};
