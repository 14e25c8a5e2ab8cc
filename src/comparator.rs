use crate::concrete::DefId;
use crate::listener::ConcreteProvider;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Less,
    Equal,
    Greater,
    Incomparable,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparison::Less => "less",
            Comparison::Equal => "equal",
            Comparison::Greater => "greater",
            Comparison::Incomparable => "incomparable",
        };
        write!(f, "{}", s)
    }
}

/// A partial order used to pick a deterministic checking order where the
/// dependency graph leaves one open.
///
/// Each method has a default written in terms of the other, so an
/// implementation must provide at least one of them.
pub trait PartialComparator<T: Clone + PartialEq> {
    fn compare(&self, a: &T, b: &T) -> Comparison {
        if a == b {
            return Comparison::Equal;
        }
        let mut pair = [a.clone(), b.clone()];
        if !self.sort(&mut pair) {
            return Comparison::Incomparable;
        }
        if pair[0] == *a {
            Comparison::Less
        } else {
            Comparison::Greater
        }
    }

    /// Reorders `list` as well as the order allows and returns whether every
    /// comparison made along the way was decided. The list is reordered even
    /// when the result is `false`.
    fn sort(&self, list: &mut [T]) -> bool {
        let mut ok = true;
        for i in 0..list.len() {
            let mut min = i;
            for j in i + 1..list.len() {
                match self.compare(&list[min], &list[j]) {
                    Comparison::Greater => min = j,
                    Comparison::Incomparable => ok = false,
                    Comparison::Less | Comparison::Equal => {}
                }
            }
            list.swap(i, min);
        }
        ok
    }
}

/// The order in which nothing is comparable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trivial;

pub fn trivial() -> Trivial {
    Trivial
}

impl<T: Clone + PartialEq> PartialComparator<T> for Trivial {
    fn compare(&self, a: &T, b: &T) -> Comparison {
        if a == b {
            Comparison::Equal
        } else {
            Comparison::Incomparable
        }
    }

    fn sort(&self, list: &mut [T]) -> bool {
        list.len() <= 1
    }
}

/// Orders definitions by where they are declared. Definitions from
/// different source files are incomparable.
pub struct SourceOrder<'a> {
    concrete: &'a dyn ConcreteProvider,
}

impl<'a> SourceOrder<'a> {
    pub fn new(concrete: &'a dyn ConcreteProvider) -> Self {
        Self { concrete }
    }
}

impl PartialComparator<DefId> for SourceOrder<'_> {
    fn compare(&self, a: &DefId, b: &DefId) -> Comparison {
        if a == b {
            return Comparison::Equal;
        }
        let (Some(a), Some(b)) = (self.concrete.get_concrete(*a), self.concrete.get_concrete(*b))
        else {
            return Comparison::Incomparable;
        };
        if a.span.source != b.span.source {
            return Comparison::Incomparable;
        }
        match a.span.start.cmp(&b.span.start) {
            std::cmp::Ordering::Less => Comparison::Less,
            std::cmp::Ordering::Greater => Comparison::Greater,
            std::cmp::Ordering::Equal => Comparison::Equal,
        }
    }
}
