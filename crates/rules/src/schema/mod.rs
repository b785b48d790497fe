//! Rule, template, controller and collector schema types with serde deserialization.
//!
//! Defines the type hierarchy the engine consumes:
//! - `InstrumentationRule` / `InjectionSpec` / `MatchCriteria`: the layered policy model
//! - `InjectionTemplate`: partial specs merged into rules that reference them
//! - `ControllerConfig`: global vendor controller credentials and proxy settings
//! - `CollectorBinding`: named telemetry-collector references
//! - `ObjectEnvelope` / `ClusterObject`: two-pass parsing of ConfigMap and custom-resource files

mod collector;
mod controller;
mod document;
mod envelope;
mod injection;
mod kind;
mod matching;
mod optional_bool;
mod rule;
mod technology;

pub use collector::*;
pub use controller::*;
pub use document::*;
pub use envelope::*;
pub use injection::*;
pub use kind::*;
pub use matching::*;
pub use optional_bool::*;
pub use rule::*;
pub use technology::*;

#[cfg(test)]
mod tests;
