//! REST adapter for the remote ticket service

pub mod remote;
mod wire;

pub use remote::HttpTicketRemote;
