//! iobus-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ ServerConfig::load()    -- TOML config with per-field defaults
//!  └─ SessionRegistry         -- the single admitted-client slot
//!  └─ ControlServer (TCP)     -- handshake, keepalive, commands   [writer]
//!  └─ DataServer (UDP)        -- pointer/keyboard/system events   [reader]
//! ```
//!
//! The TCP control plane is the single source of truth for "who is the
//! client": the data plane only compares datagram source addresses against
//! the session the control plane admitted.

pub mod config;
pub mod input;
pub mod session;
pub mod transport;
