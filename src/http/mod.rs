//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, connect info, trace span)
//!     → middleware.rs (admission → client access → target host)
//!     → request.rs (body capture under the cap, header preparation)
//!     → forward.rs (single upstream attempt under the deadline)
//!     → response.rs (status, headers, streamed body)
//!     → Send to client
//! ```

pub mod connector;
pub mod forward;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{Deadline, ForwardingEngine};
pub use server::{build_router, AppState, HttpServer, StartupError};
