//! Envelope encryption
//!
//! Control flow: [`EnvelopeCrypto`] asks the [`KeyResolver`] for a scope's
//! key; the resolver reads through the key record store, creates a record
//! on first use, and unwraps it with the master key.

mod resolver;
mod service;

pub use resolver::KeyResolver;
pub use service::EnvelopeCrypto;
