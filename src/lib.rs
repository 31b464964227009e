//! Mirrors on-screen text to a paired pair of glasses.
//!
//! [`infrastructure::capture`] turns accessibility events into text snapshots,
//! [`infrastructure::glasses`] keeps the vendor session and the custom view on
//! the glasses in sync with them.

pub mod domain;
pub mod error;
pub mod infrastructure;
