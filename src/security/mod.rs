//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → admission.rs (bounded concurrency, shed load)
//!     → client_ip.rs + access_control.rs (client allow-list)
//!     → hosts.rs (target host allow-list)
//!     → Pass to forwarding
//! ```
//!
//! # Design Decisions
//! - Lists are immutable after startup and shared without locks
//! - Empty lists allow everything; startup warns about it
//! - Malformed rules abort startup instead of being skipped

pub mod access_control;
pub mod admission;
pub mod client_ip;
pub mod hosts;

pub use access_control::{AccessControlList, AclError};
pub use admission::{AdmissionController, AdmissionPermit};
pub use hosts::HostAllowList;
