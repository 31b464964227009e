//! Glasses Module
//!
//! Drives the vendor SDK for the paired glasses.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     GlassesService                       │
//! │   (single event loop - public API via ServiceHandle)     │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┐
//!         │             │              │
//!         ▼             ▼              ▼
//! ┌────────────┐  ┌────────────┐  ┌──────────┐
//! │ Connection │  │  Display   │  │  Layout  │
//! │            │  │            │  │          │
//! │ - init     │  │ - open     │  │ - view   │
//! │ - connect  │  │ - update   │  │   tree   │
//! │ - timeouts │  │ - closure  │  │ - patches│
//! └─────┬──────┘  └─────┬──────┘  └──────────┘
//!       └───────┬───────┘
//!               ▼
//!        ┌────────────┐
//!        │ GlassesSdk │  (vendor seam, callbacks → events)
//!        └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`sdk`] - Vendor SDK trait, link probe and callback listeners
//! - [`events`] - Events consumed by the service loop
//! - [`connection`] - Session state machine
//! - [`display`] - Custom view state machine and content delivery
//! - [`layout`] - JSON markup for the custom view
//! - [`service`] - Coordinator and UI-facing handle
//! - [`simulated`] - In-process stand-in for the vendor library

pub mod connection;
pub mod display;
pub mod events;
pub mod layout;
pub mod sdk;
pub mod service;
pub mod simulated;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main service for convenience
pub use service::{GlassesService, ServiceHandle};
