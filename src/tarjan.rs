//! Tarjan's strongly connected components over a lazily discovered graph.
//!
//! Edges are not stored: the [`SccHandler`] is asked for a node's successors
//! the first time the node is entered, and is told about every component as
//! soon as it closes. Components close in dependency order, so a handler
//! that processes them as they arrive sees every dependency of a component
//! before the component itself.
//!
//! The traversal keeps an explicit stack of frames instead of recursing, so
//! long dependency chains do not grow the call stack.
//!
//! See https://en.wikipedia.org/wiki/Tarjan%27s_strongly_connected_components_algorithm

use std::collections::HashMap;
use std::hash::Hash;

pub trait SccHandler<T> {
    /// Pushes the successors of `node` into `successors` and returns whether
    /// `node` has an edge to itself. Self edges must not be pushed.
    fn for_dependencies(&mut self, node: &T, successors: &mut Vec<T>) -> bool;

    /// Called once per component, members in the order they were popped.
    /// `with_loops` is set when some member reported a self edge.
    fn scc_found(&mut self, component: Vec<T>, with_loops: bool);
}

#[derive(Debug, Clone, Copy)]
struct NodeState {
    /// Order in which the node was entered. Unique.
    index: usize,
    /// Smallest index of any on-stack node reachable from this node.
    lowlink: usize,
    /// Cleared when the node's component is closed.
    on_stack: bool,
    self_loop: bool,
}

struct Frame<T> {
    node: T,
    successors: std::vec::IntoIter<T>,
}

pub struct Tarjan<T: Eq + Hash + Clone> {
    nodes: HashMap<T, NodeState>,
    /// Nodes entered but not yet assigned to a component.
    stack: Vec<T>,
    count: usize,
}

impl<T: Eq + Hash + Clone> Default for Tarjan<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> Tarjan<T> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            stack: Vec::new(),
            count: 0,
        }
    }

    pub fn is_visited(&self, node: &T) -> bool {
        self.nodes.contains_key(node)
    }

    /// Visits `root` and everything reachable from it that has not been
    /// visited by an earlier call. Does nothing if `root` was visited before.
    pub fn order<H>(&mut self, root: T, handler: &mut H)
    where
        H: SccHandler<T> + ?Sized,
    {
        if self.nodes.contains_key(&root) {
            return;
        }

        let mut frames = vec![self.enter(root, handler)];
        loop {
            let Some(frame) = frames.last_mut() else {
                break;
            };
            let current = frame.node.clone();

            match frame.successors.next() {
                Some(successor) => match self.nodes.get(&successor) {
                    None => {
                        let child = self.enter(successor, handler);
                        frames.push(child);
                    }
                    Some(state) if state.on_stack => {
                        // Back edge into the current DFS path.
                        let index = state.index;
                        self.lower(&current, index);
                    }
                    // Cross edge into an already closed component.
                    Some(_) => {}
                },
                None => {
                    frames.pop();
                    let lowlink = self.leave(current, handler);
                    if let Some(parent) = frames.last() {
                        let parent = parent.node.clone();
                        self.lower(&parent, lowlink);
                    }
                }
            }
        }
    }

    fn enter<H>(&mut self, node: T, handler: &mut H) -> Frame<T>
    where
        H: SccHandler<T> + ?Sized,
    {
        let index = self.count;
        self.count += 1;
        self.nodes.insert(
            node.clone(),
            NodeState {
                index,
                lowlink: index,
                on_stack: true,
                self_loop: false,
            },
        );
        self.stack.push(node.clone());

        let mut successors = Vec::new();
        let self_loop = handler.for_dependencies(&node, &mut successors);
        if let Some(state) = self.nodes.get_mut(&node) {
            state.self_loop = self_loop;
        }

        Frame {
            node,
            successors: successors.into_iter(),
        }
    }

    fn lower(&mut self, node: &T, value: usize) {
        if let Some(state) = self.nodes.get_mut(node) {
            state.lowlink = state.lowlink.min(value);
        }
    }

    /// Closes the component rooted at `node`, if it is a root, and returns
    /// the node's final lowlink.
    fn leave<H>(&mut self, node: T, handler: &mut H) -> usize
    where
        H: SccHandler<T> + ?Sized,
    {
        let Some(state) = self.nodes.get(&node).copied() else {
            return usize::MAX;
        };
        if state.lowlink != state.index {
            return state.lowlink;
        }

        let mut component = Vec::new();
        let mut with_loops = false;
        while let Some(member) = self.stack.pop() {
            if let Some(member_state) = self.nodes.get_mut(&member) {
                member_state.on_stack = false;
                with_loops |= member_state.self_loop;
            }
            let is_root = member == node;
            component.push(member);
            if is_root {
                break;
            }
        }

        handler.scc_found(component, with_loops);
        state.lowlink
    }
}
