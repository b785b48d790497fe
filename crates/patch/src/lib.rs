//! Patch synthesis for instrumented workloads.
//!
//! This crate provides:
//! - Application and tier naming strategies, including minijinja expressions
//! - The collector binder resolving collector references to endpoints or sidecars
//! - Per technology/vendor builders emitting agent patches
//! - `PatchSynthesizer`: initializers, dispatch and env de-duplication
//! - `AdmissionEngine`: pod and custom-resource admission on top of the rule registry

pub mod admission;
pub mod builders;
pub mod collector;
pub mod env;
pub mod error;
pub mod naming;
pub mod patch_list;
pub mod synthesizer;

pub use admission::{AdmissionEngine, AdmissionRequest, Operation, Resource};
pub use error::{Result, SynthError};
pub use naming::{NamespaceLookup, StaticNamespaces};
pub use synthesizer::PatchSynthesizer;
