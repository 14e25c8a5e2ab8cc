use crate::concrete::DefId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    #[error("ordering was canceled")]
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CycleKind {
    /// Definitions that refer to each other in a way that cannot be split
    /// into header and body checking.
    Definitions,
    /// Instances that only depend on each other through instance search.
    Instances,
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleKind::Definitions => write!(f, "definition"),
            CycleKind::Instances => write!(f, "instance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind} cycle between {} definitions", .members.len())]
pub struct CycleError {
    pub members: Vec<DefId>,
    pub kind: CycleKind,
}

impl CycleError {
    pub fn new(members: &[DefId], instance_cycle: bool) -> Self {
        CycleError {
            members: members.to_vec(),
            kind: if instance_cycle {
                CycleKind::Instances
            } else {
                CycleKind::Definitions
            },
        }
    }
}
