//! Translate Balancer - stateless HTTP load balancer with failover for
//! translation services.
//!
//! Clients `POST` a JSON translation request to `/translate`. The balancer
//! forwards it to a randomly chosen backend endpoint, fails over to the
//! remaining endpoints on errors, and relays the first successful response.

pub mod config;
pub mod error;
pub mod pool;
pub mod proxy;
