//! In-memory compiled model.
//!
//! [`ModelRepository`] is an arena of [`Node`]s. Every node has a classifier
//! (itself a node), an optional source span, compile states and a property
//! table mapping property names to ordered value lists. A fresh repository
//! holds the kernel metamodel ([`Kernel`]): `Root`, `Package`, the primitive
//! types and the handful of classes the binary format needs to recognize.

mod compile_state;
mod error;
mod kernel;
pub mod m3;
mod node;
mod primitive;
mod repository;
mod source;
mod stubs;

pub use compile_state::CompileStates;
pub use error::{ModelError, Result};
pub use kernel::{ImplementationRegistry, Kernel};
pub use node::{ImplementationKind, Node, NodeId, Property, RealKey};
pub use primitive::{IntegerValue, PrimitiveValue};
pub use repository::ModelRepository;
pub use source::Source;
pub use stubs::{M3StubResolver, StubKind, StubResolver};
