//! # syncbridge testkit
//!
//! Test utilities for syncbridge.
//!
//! This crate provides:
//! - A catalog schema (product, variant, translation, channel pricing) with
//!   object builders
//! - Demo input and output clients working on that catalog
//! - A fully wired harness and temp-dir journal fixtures
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use syncbridge_testkit::prelude::*;
//!
//! #[test]
//! fn variant_change_reaches_product_record() {
//!     let harness = SyncHarness::new();
//!     let product = catalog::product(1, "MUG");
//!     let variant = catalog::variant(10, "MUG-RED", &product);
//!     let notifications = harness
//!         .flush(&PendingFlush::new().update(variant, raw_changes([("onHand", 0, 5)])))
//!         .unwrap();
//!     assert!(notifications.is_empty());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod clients;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::catalog;
    pub use crate::clients::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use syncbridge_engine::PendingFlush;
}

pub use clients::*;
pub use fixtures::*;
pub use generators::*;
