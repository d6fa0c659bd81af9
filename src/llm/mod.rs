//! Remote model API access.

pub mod client;

pub use client::{GenerationOptions, GenerationRequest, HttpModelClient, ModelClient};
