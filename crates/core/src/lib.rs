//! Trellis Core - Shared value and error types for Trellis.
//!
//! This crate provides the foundational types used by every Trellis crate:
//!
//! - `Value`: The dynamically typed value produced by bindings and stored in
//!   observable properties. Objects are shared and compared by identity.
//! - `Error`: Error types for scheduling, observation and DOM operations.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::Value;
//!
//! let name = Value::from("Ada");
//! assert!(name.is_truthy());
//! assert_eq!(name.to_text(), "Ada");
//!
//! let shared = Value::object(vec![1, 2, 3]);
//! assert!(shared.same(&shared.clone()));
//! assert!(!shared.same(&Value::object(vec![1, 2, 3])));
//! ```

#![no_std]

extern crate alloc;

mod error;
mod value;

pub use error::{Error, Result};
pub use value::Value;
