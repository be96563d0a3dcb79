//! External service integrations

pub mod ticketing;
