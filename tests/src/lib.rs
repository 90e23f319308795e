//! # Hue Reset Test Suite
//!
//! Cross-crate scenarios driven through the in-memory bridge.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs        # Bridge, orchestrator and status capture
//!     ├── reset_cycle.rs     # Full reset and rejoin cycles
//!     └── runtime_flows.rs   # Operator input through the runtime
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p hr-tests
//! cargo test -p hr-tests integration::reset_cycle::
//! ```

pub mod integration;
