//! Time abstractions
//!
//! - **[`Clock`]**: monotonic + wall-clock source, injectable for tests
//! - **[`SystemClock`]**: production clock
//! - **[`MockClock`]**: manually advanced clock for deterministic expiry tests
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use keystore_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let before = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now() - before, Duration::from_secs(5));
//! ```

mod clock;

pub use clock::{Clock, MockClock, SystemClock};
