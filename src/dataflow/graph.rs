use super::Sequence;
use crate::Parallelism;
use core::{
    cell::UnsafeCell,
    hash::Hash,
    sync::atomic::{AtomicUsize, Ordering},
};
use std::collections::HashMap;

/// Declared access of a task to a region of data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access<R> {
    /// The task reads the region.
    Read(R),
    /// The task reads and writes the region.
    Write(R),
}

/// Number of tasks that ran, and of tasks that were skipped because the sequence had failed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Tasks whose body was executed.
    pub executed: usize,
    /// Tasks whose body was dropped without running.
    pub skipped: usize,
}

impl core::ops::AddAssign for GraphStats {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.executed += rhs.executed;
        self.skipped += rhs.skipped;
    }
}

type Body<'a> = Box<dyn FnOnce() + Send + 'a>;

struct Node<'a> {
    name: &'static str,
    body: UnsafeCell<Option<Body<'a>>>,
    predecessors: Vec<usize>,
    successors: Vec<usize>,
}

// SAFETY: `body` is taken exactly once, by the thread that brought the node's pending count to
// zero (or by the sequential executor). No other field is mutated during execution.
unsafe impl Sync for Node<'_> {}

/// Directed acyclic graph of tasks, with edges derived from declared region accesses.
///
/// A task depends on:
/// * the last task that wrote any region it reads,
/// * the last task that wrote, and every task that read since that write, any region it writes.
///
/// Tasks are numbered in submission order, and every edge goes from a lower to a higher number.
pub struct TaskGraph<'a, R> {
    nodes: Vec<Node<'a>>,
    last_writer: HashMap<R, usize>,
    readers: HashMap<R, Vec<usize>>,
}

impl<R> core::fmt::Debug for TaskGraph<'_, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(
                self.nodes
                    .iter()
                    .enumerate()
                    .map(|(id, node)| (id, node.name, &node.predecessors)),
            )
            .finish()
    }
}

impl<R: Copy + Eq + Hash> Default for TaskGraph<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, R: Copy + Eq + Hash> TaskGraph<'a, R> {
    /// Returns an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            last_writer: HashMap::new(),
            readers: HashMap::new(),
        }
    }

    /// Returns the number of submitted tasks.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no task was submitted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the tasks that task `id` waits for, in increasing order.
    #[inline]
    pub fn predecessors(&self, id: usize) -> &[usize] {
        &self.nodes[id].predecessors
    }

    /// Returns the name task `id` was submitted with.
    #[inline]
    pub fn name(&self, id: usize) -> &'static str {
        self.nodes[id].name
    }

    /// Adds a task to the graph and returns its id.
    pub fn submit(
        &mut self,
        name: &'static str,
        accesses: &[Access<R>],
        body: impl FnOnce() + Send + 'a,
    ) -> usize {
        let id = self.nodes.len();
        let mut predecessors = Vec::new();

        for &access in accesses {
            match access {
                Access::Read(region) => {
                    if let Some(&writer) = self.last_writer.get(&region) {
                        predecessors.push(writer);
                    }
                    self.readers.entry(region).or_default().push(id);
                }
                Access::Write(region) => {
                    if let Some(&writer) = self.last_writer.get(&region) {
                        predecessors.push(writer);
                    }
                    if let Some(readers) = self.readers.remove(&region) {
                        predecessors.extend(readers);
                    }
                    self.last_writer.insert(region, id);
                }
            }
        }

        predecessors.sort_unstable();
        predecessors.dedup();
        predecessors.retain(|&p| p != id);

        for &p in &predecessors {
            self.nodes[p].successors.push(id);
        }
        self.nodes.push(Node {
            name,
            body: UnsafeCell::new(Some(Box::new(body))),
            predecessors,
            successors: Vec::new(),
        });
        id
    }

    /// Runs every task of the graph, and returns once all of them have completed.
    ///
    /// With [`Parallelism::None`], tasks run on the calling thread in submission order. Otherwise
    /// they run on the current rayon thread pool, each task starting once all its predecessors
    /// have completed. A task that starts after `sequence` holds a failure is skipped.
    pub fn execute(self, sequence: &Sequence, parallelism: Parallelism) -> GraphStats {
        let nodes = self.nodes;
        let executed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);

        let run = |node: &Node<'a>| {
            // SAFETY: see `impl Sync for Node`.
            let body = unsafe { (*node.body.get()).take() };
            if let Some(body) = body {
                if sequence.is_ok() {
                    body();
                    executed.fetch_add(1, Ordering::Relaxed);
                } else {
                    drop(body);
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
            }
        };

        if parallelism == Parallelism::None {
            nodes.iter().for_each(run);
        } else {
            let pending: Vec<AtomicUsize> = nodes
                .iter()
                .map(|node| AtomicUsize::new(node.predecessors.len()))
                .collect();
            let ctx = Executor {
                nodes: &nodes,
                pending: &pending,
                run: &run,
            };
            rayon::scope(|scope| {
                for (id, node) in nodes.iter().enumerate() {
                    if node.predecessors.is_empty() {
                        let ctx = &ctx;
                        scope.spawn(move |scope| ctx.spawn_from(scope, id));
                    }
                }
            });
        }

        GraphStats {
            executed: executed.into_inner(),
            skipped: skipped.into_inner(),
        }
    }
}

struct Executor<'g, 'a, F> {
    nodes: &'g [Node<'a>],
    pending: &'g [AtomicUsize],
    run: &'g F,
}

impl<'g, 'a, F: Fn(&Node<'a>) + Sync> Executor<'g, 'a, F> {
    fn spawn_from<'s>(&'s self, scope: &rayon::Scope<'s>, id: usize) {
        let node = &self.nodes[id];
        (self.run)(node);
        for &succ in &node.successors {
            if self.pending[succ].fetch_sub(1, Ordering::AcqRel) == 1 {
                scope.spawn(move |scope| self.spawn_from(scope, succ));
            }
        }
    }
}
