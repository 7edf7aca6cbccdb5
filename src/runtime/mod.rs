// Copyright 2025 Cowboy AI, LLC.

//! Running composites
//!
//! A [`CompositeInstance`] holds its mixins, its state and one lazily
//! built concern/side-effect chain per method. Every call goes through
//! the same pipeline:
//!
//! ```text
//! constraints -> concerns (outermost first) -> mixin -> side-effects
//! ```
//!
//! A constraint violation stops the call before any concern runs. A
//! concern may return without proceeding. Side-effects run on every
//! successful result; their ordinary errors are logged and dropped.

mod builders;
mod composite;
mod injection;
mod invocation;
mod service;

pub use builders::{TransientBuilder, ValueBuilder};
pub use composite::{CompositeInstance, CompositeRef};
pub(crate) use composite::{initial_state, validate_state, StateBinding};
pub use injection::{InjectionContext, Structure, Uses};
pub use invocation::{Invocation, InvocationPhase, Next};
pub use service::{ServiceInstance, ServiceReference};
