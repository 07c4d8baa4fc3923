//! File format registry and native format models for nomina
//!
//! This crate owns the "spoke" side of the hub-and-spoke conversion:
//!
//! - [`registry`] - declarative list of known accounting file formats and
//!   extension+content based detection, including inside ZIP archives
//! - [`gnucash`] - GnuCash XML object model and codec (quick-xml)
//! - [`beancount`] - Beancount directive model, printer and subset reader
//! - [`bzv`] - Banking ZV (Subsembly) JSON/YAML bank export models
//! - [`msmoney`] - Microsoft Money ZIP dumps as a typed table store

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod beancount;
pub mod bzv;
pub mod gnucash;
pub mod msmoney;
pub mod registry;

pub use registry::{DetectError, FileFormat, FormatAcronym, FormatRegistry, UnknownAcronym};
