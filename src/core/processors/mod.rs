//! Per-billing-system processors
//!
//! Each configured system is resolved through the [`ProcessorRegistry`] and
//! its [`Processor`] runs that system's own init scripts from
//! `{scripts_root}/{system}/init`.

pub mod bookkeeper;
pub mod registry;
pub mod traits;
pub mod tripica;

pub use bookkeeper::BookkeeperProcessor;
pub use registry::{ProcessorFactory, ProcessorRegistry};
pub use traits::{Processor, ProcessorContext};
pub use tripica::TripicaProcessor;
