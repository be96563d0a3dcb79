//! HTTP transport

pub mod client;

pub use client::{check_status, classify_status, HttpClient, HttpClientBuilder};
