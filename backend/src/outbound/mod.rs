//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! Adapters are thin translators between domain types and the backing
//! infrastructure. They contain no business logic.
//!
//! - **memory**: in-process report store and live spatial index

pub mod memory;
