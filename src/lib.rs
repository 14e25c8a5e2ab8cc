//! Decides the order in which the definitions of a dependently-typed
//! language are handed to the type checker.
//!
//! The entry point is [`ordering::Ordering`]: it discovers dependencies
//! from [`concrete`] syntax, groups definitions into strongly connected
//! components with [`tarjan::Tarjan`], and reports each component to an
//! [`listener::OrderingListener`] as a unit, a recursive group with
//! separate header and body phases, or an unsplittable cycle.
//! [`driver::typecheck`] wires an ordering to a [`driver::Typechecker`].

pub mod collect;
pub mod comparator;
pub mod concrete;
pub mod config;
pub mod dependency;
pub mod driver;
pub mod error;
pub mod format;
pub mod listener;
pub mod ordering;
pub mod outline;
pub mod sources;
pub mod table;
pub mod tarjan;

pub use concrete::{DefId, Definition, Group};
pub use config::OrderingConfig;
pub use error::{CycleError, CycleKind, OrderingError};
pub use ordering::{Ordering, OrderingEnv, Stage, canonicalize};
