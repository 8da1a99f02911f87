//! Typed introspection and access layer over code-generated simulation models.
//!
//! Generated models publish their model parameters, block parameters and signals
//! through metadata tables: names, data types, dimensions and live data addresses.
//! This crate walks those tables and exposes every value as a strided view over model
//! memory or as a validated write target.
//!
//! The pieces, leaves first:
//!
//! - [`datatype`]: the closed table of native element types
//! - [`mapping`]: the contracts a generated model has to provide
//! - [`resolver`]: cached name to table-row lookups
//! - [`buffer`]: strided views and validated writes
//! - [`hierarchy`]: discovery of referenced sub-models
//! - [`session`]: a model's lifecycle plus everything above behind one API
//!
//! [`capi`] binds the contracts to the C tables emitted by the code generator and
//! [`in_memory`] provides host-side stand-ins.

pub mod buffer;
pub mod capi;
pub mod datatype;
pub mod errors;
pub mod hierarchy;
pub mod in_memory;
pub mod info;
pub mod mapping;
pub mod resolver;
pub mod session;

#[cfg(feature = "python")]
pub mod python;

pub use errors::{SimlinkError, SimlinkResult};
pub use session::{ModelSession, SessionConfig};
