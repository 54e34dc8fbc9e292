// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! Reactive property graph
//!
//! Named, typed slots with explicitly declared dependencies. Computed
//! properties are recomputed eagerly inside the serialized write path, on
//! the writer's thread under the graph lock, not on the owner thread. Reads
//! are a lookup and see the new derived values as soon as the write returns,
//! even while the owner thread is busy. Change notifications for one write
//! batch are posted to the owner thread as a single wave with one entry per
//! affected property.

use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::dispatcher::Dispatcher;

/// Property graph configuration and access errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Property '{0}' is already declared")]
    DuplicateProperty(String),

    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    #[error("Property '{0}' is computed and cannot be written")]
    NotBaseProperty(String),

    #[error("Property '{name}' holds {expected}, not {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Property '{0}' depends on properties that are not declared yet")]
    Unresolved(String),

    #[error("Dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// A value that can live in the graph.
///
/// Implemented for every `PartialEq + Debug` type, so equality is value
/// equality and never pointer identity.
pub trait PropertyValue: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn equals(&self, other: &dyn PropertyValue) -> bool;
}

impl<T> PropertyValue for T
where
    T: Any + Send + Sync + fmt::Debug + PartialEq,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn PropertyValue) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| self == o)
    }
}

pub type SharedValue = Arc<dyn PropertyValue>;

type ComputeFn = Arc<dyn Fn(&Snapshot<'_>) -> SharedValue + Send + Sync>;
type Callback = Arc<dyn Fn(&PropertyChange) + Send + Sync>;

/// Read-only view handed to compute functions.
/// Only the property's declared dependencies are visible.
pub struct Snapshot<'a> {
    nodes: &'a HashMap<String, Node>,
    deps: &'a [String],
}

impl<'a> Snapshot<'a> {
    pub fn get<T: Any>(&self, name: &str) -> Option<&'a T> {
        if !self.deps.iter().any(|d| d == name) {
            return None;
        }
        self.nodes.get(name)?.value.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Cloned value, or `T::default()` when absent
    pub fn value<T: Any + Clone + Default>(&self, name: &str) -> T {
        self.get::<T>(name).cloned().unwrap_or_default()
    }
}

/// One entry of a notification wave
#[derive(Debug, Clone)]
pub struct PropertyChange {
    pub name: String,
    pub value: SharedValue,
}

impl PropertyChange {
    pub fn value<T: Any>(&self) -> Option<&T> {
        self.value.as_any().downcast_ref::<T>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    filter: Option<HashSet<String>>,
    callback: Callback,
}

impl Subscriber {
    fn wants(&self, name: &str) -> bool {
        self.filter.as_ref().map_or(true, |f| f.contains(name))
    }
}

enum NodeKind {
    Base,
    Computed { deps: Vec<String>, compute: ComputeFn },
}

struct Node {
    type_id: TypeId,
    type_name: &'static str,
    /// None while a computed property waits for undeclared dependencies
    value: Option<SharedValue>,
    kind: NodeKind,
}

#[derive(Default)]
struct GraphInner {
    nodes: HashMap<String, Node>,
    dependents: HashMap<String, Vec<String>>,
}

impl GraphInner {
    fn has_value(&self, name: &str) -> bool {
        self.nodes.get(name).is_some_and(|n| n.value.is_some())
    }

    fn deps_of(&self, name: &str) -> &[String] {
        match self.nodes.get(name) {
            Some(Node {
                kind: NodeKind::Computed { deps, .. },
                ..
            }) => deps.as_slice(),
            _ => &[],
        }
    }

    /// Depth-first search along declared dependencies
    fn find_path(&self, from: &str, target: &str, path: &mut Vec<String>, visited: &mut HashSet<String>) -> bool {
        path.push(from.to_string());
        if from == target {
            return true;
        }
        if visited.insert(from.to_string()) {
            for dep in self.deps_of(from) {
                if self.find_path(dep, target, path, visited) {
                    return true;
                }
            }
        }
        path.pop();
        false
    }

    fn recompute(&mut self, name: &str) -> bool {
        let value = match self.nodes.get(name) {
            Some(Node {
                kind: NodeKind::Computed { deps, compute },
                ..
            }) => {
                if !deps.iter().all(|d| self.has_value(d)) {
                    return false;
                }
                compute(&Snapshot {
                    nodes: &self.nodes,
                    deps,
                })
            }
            _ => return false,
        };
        if let Some(node) = self.nodes.get_mut(name) {
            node.value = Some(value);
        }
        true
    }

    /// Compute every pending property whose dependencies now all exist
    fn resolve_pending(&mut self) {
        loop {
            let mut ready: Vec<String> = self
                .nodes
                .iter()
                .filter(|(name, node)| {
                    node.value.is_none() && self.deps_of(name).iter().all(|d| self.has_value(d))
                })
                .map(|(name, _)| name.clone())
                .collect();
            if ready.is_empty() {
                return;
            }
            ready.sort();
            for name in ready {
                self.recompute(&name);
            }
        }
    }

    fn write<T: PropertyValue>(&mut self, name: &str, value: T, only_if_changed: bool) -> Result<bool, GraphError> {
        let node = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| GraphError::UnknownProperty(name.to_string()))?;
        if !matches!(node.kind, NodeKind::Base) {
            return Err(GraphError::NotBaseProperty(name.to_string()));
        }
        if node.type_id != TypeId::of::<T>() {
            return Err(GraphError::TypeMismatch {
                name: name.to_string(),
                expected: node.type_name,
                actual: type_name::<T>(),
            });
        }
        if only_if_changed && node.value.as_ref().is_some_and(|old| old.equals(&value)) {
            return Ok(false);
        }
        node.value = Some(Arc::new(value));
        Ok(true)
    }

    /// Recompute every transitive dependent of `changed` once, in
    /// dependency order. Returns the names that were recomputed.
    fn propagate(&mut self, changed: &[String]) -> Vec<String> {
        let mut affected: HashSet<String> = HashSet::new();
        let mut stack: Vec<String> = changed.to_vec();
        while let Some(name) = stack.pop() {
            if let Some(dependents) = self.dependents.get(&name) {
                for dependent in dependents {
                    if affected.insert(dependent.clone()) {
                        stack.push(dependent.clone());
                    }
                }
            }
        }

        let mut indegree: HashMap<String, usize> = affected
            .iter()
            .map(|name| {
                let count = self.deps_of(name).iter().filter(|d| affected.contains(*d)).count();
                (name.clone(), count)
            })
            .collect();

        let mut roots: Vec<String> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| name.clone())
            .collect();
        roots.sort();
        let mut ready: VecDeque<String> = roots.into();

        let mut order = Vec::with_capacity(affected.len());
        while let Some(name) = ready.pop_front() {
            if let Some(dependents) = self.dependents.get(&name) {
                for dependent in dependents {
                    if let Some(degree) = indegree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push_back(dependent.clone());
                        }
                    }
                }
            }
            order.push(name);
        }

        order.retain(|name| self.recompute(name));
        order
    }
}

/// Writes grouped into one notification wave
pub struct Batch<'a> {
    inner: &'a mut GraphInner,
    changed: Vec<String>,
}

impl Batch<'_> {
    /// Write a base property and always notify
    pub fn set<T: PropertyValue>(&mut self, name: &str, value: T) -> Result<(), GraphError> {
        self.inner.write(name, value, false)?;
        self.mark(name);
        Ok(())
    }

    /// Write only when the value differs; returns whether it did
    pub fn set_if_changed<T: PropertyValue>(&mut self, name: &str, value: T) -> Result<bool, GraphError> {
        let written = self.inner.write(name, value, true)?;
        if written {
            self.mark(name);
        }
        Ok(written)
    }

    fn mark(&mut self, name: &str) {
        if !self.changed.iter().any(|n| n == name) {
            self.changed.push(name.to_string());
        }
    }
}

/// The reactive store shared by the session and the front end
pub struct PropertyGraph {
    inner: Mutex<GraphInner>,
    subscribers: Arc<Mutex<Vec<Arc<Subscriber>>>>,
    next_subscription: AtomicU64,
    dispatcher: Arc<dyn Dispatcher>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PropertyGraph {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            inner: Mutex::new(GraphInner::default()),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscription: AtomicU64::new(1),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    /// Register a base property with its initial value
    pub fn declare<T: PropertyValue>(&self, name: &str, initial: T) -> Result<(), GraphError> {
        let mut inner = lock(&self.inner);
        if inner.nodes.contains_key(name) {
            return Err(GraphError::DuplicateProperty(name.to_string()));
        }
        inner.nodes.insert(
            name.to_string(),
            Node {
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                value: Some(Arc::new(initial)),
                kind: NodeKind::Base,
            },
        );
        inner.resolve_pending();
        Ok(())
    }

    /// Register a computed property.
    ///
    /// Dependencies may be declared later; until they all exist the property
    /// reads as [`GraphError::Unresolved`]. A declaration that would close a
    /// dependency cycle is rejected.
    pub fn declare_computed<T, F>(&self, name: &str, deps: &[&str], compute: F) -> Result<(), GraphError>
    where
        T: PropertyValue,
        F: Fn(&Snapshot<'_>) -> T + Send + Sync + 'static,
    {
        let mut inner = lock(&self.inner);
        if inner.nodes.contains_key(name) {
            return Err(GraphError::DuplicateProperty(name.to_string()));
        }

        let mut unique: Vec<String> = Vec::with_capacity(deps.len());
        for dep in deps {
            if !unique.iter().any(|d| d == dep) {
                unique.push(dep.to_string());
            }
        }

        for dep in &unique {
            let mut path = vec![name.to_string()];
            if inner.find_path(dep, name, &mut path, &mut HashSet::new()) {
                return Err(GraphError::Cycle(path));
            }
        }

        for dep in &unique {
            inner.dependents.entry(dep.clone()).or_default().push(name.to_string());
        }
        inner.nodes.insert(
            name.to_string(),
            Node {
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                value: None,
                kind: NodeKind::Computed {
                    deps: unique,
                    compute: Arc::new(move |snapshot: &Snapshot<'_>| -> SharedValue { Arc::new(compute(snapshot)) }),
                },
            },
        );
        inner.resolve_pending();
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.inner).nodes.contains_key(name)
    }

    pub fn get<T: PropertyValue + Clone>(&self, name: &str) -> Result<T, GraphError> {
        let inner = lock(&self.inner);
        let node = inner
            .nodes
            .get(name)
            .ok_or_else(|| GraphError::UnknownProperty(name.to_string()))?;
        let value = node
            .value
            .as_ref()
            .ok_or_else(|| GraphError::Unresolved(name.to_string()))?;
        value
            .as_any()
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| GraphError::TypeMismatch {
                name: name.to_string(),
                expected: node.type_name,
                actual: type_name::<T>(),
            })
    }

    pub fn get_shared(&self, name: &str) -> Result<SharedValue, GraphError> {
        let inner = lock(&self.inner);
        let node = inner
            .nodes
            .get(name)
            .ok_or_else(|| GraphError::UnknownProperty(name.to_string()))?;
        node.value
            .clone()
            .ok_or_else(|| GraphError::Unresolved(name.to_string()))
    }

    /// Write a base property. Always notifies, even for an equal value.
    pub fn set<T: PropertyValue>(&self, name: &str, value: T) -> Result<(), GraphError> {
        self.batch(move |b| b.set(name, value))
    }

    /// Write a base property unless the value is equal to the current one
    pub fn set_if_changed<T: PropertyValue>(&self, name: &str, value: T) -> Result<bool, GraphError> {
        self.batch(move |b| b.set_if_changed(name, value))
    }

    /// Apply several writes as one notification wave.
    ///
    /// Writes made before an error are kept and still notified.
    pub fn batch<R, F>(&self, f: F) -> Result<R, GraphError>
    where
        F: FnOnce(&mut Batch<'_>) -> Result<R, GraphError>,
    {
        let mut inner = lock(&self.inner);
        let (result, changed) = {
            let mut batch = Batch {
                inner: &mut *inner,
                changed: Vec::new(),
            };
            let result = f(&mut batch);
            (result, batch.changed)
        };

        if !changed.is_empty() {
            let recomputed = inner.propagate(&changed);
            let changes: Vec<PropertyChange> = changed
                .into_iter()
                .chain(recomputed)
                .filter_map(|name| {
                    let value = inner.nodes.get(&name)?.value.clone()?;
                    Some(PropertyChange { name, value })
                })
                .collect();
            // Posted under the write lock so waves keep write order
            self.post_wave(changes);
        }
        result
    }

    fn post_wave(&self, changes: Vec<PropertyChange>) {
        let subscribers = self.subscribers.clone();
        self.dispatcher.begin_invoke(Box::new(move || {
            let current: Vec<Arc<Subscriber>> = lock(&subscribers).clone();
            for change in &changes {
                for subscriber in current.iter().filter(|s| s.wants(&change.name)) {
                    (subscriber.callback)(change);
                }
            }
        }));
    }

    /// Receive every change, on the owner thread
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PropertyChange) + Send + Sync + 'static,
    {
        self.add_subscriber(None, Arc::new(callback))
    }

    /// Receive changes of the named properties only
    pub fn subscribe_to<F>(&self, names: &[&str], callback: F) -> SubscriptionId
    where
        F: Fn(&PropertyChange) + Send + Sync + 'static,
    {
        let filter = names.iter().map(|n| n.to_string()).collect();
        self.add_subscriber(Some(filter), Arc::new(callback))
    }

    fn add_subscriber(&self, filter: Option<HashSet<String>>, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscribers).push(Arc::new(Subscriber { id, filter, callback }));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::OwnerThread;
    use std::sync::atomic::AtomicUsize;

    fn graph() -> (PropertyGraph, Arc<OwnerThread>) {
        let owner = OwnerThread::spawn("graph-test").unwrap();
        (PropertyGraph::new(owner.clone()), owner)
    }

    fn record(graph: &PropertyGraph) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        graph.subscribe(move |change| sink.lock().unwrap().push(change.name.clone()));
        seen
    }

    #[test]
    fn test_declare_and_read() {
        let (graph, _owner) = graph();
        graph.declare("Count", 3u32).unwrap();
        graph
            .declare_computed("Double", &["Count"], |s| s.value::<u32>("Count") * 2)
            .unwrap();

        assert_eq!(graph.get::<u32>("Double").unwrap(), 6);
        graph.set("Count", 5u32).unwrap();
        assert_eq!(graph.get::<u32>("Double").unwrap(), 10);
    }

    #[test]
    fn test_access_errors() {
        let (graph, _owner) = graph();
        graph.declare("Name", String::from("a")).unwrap();
        graph.declare_computed("Len", &["Name"], |s| s.value::<String>("Name").len()).unwrap();

        assert_eq!(
            graph.declare("Name", 1u8),
            Err(GraphError::DuplicateProperty("Name".into()))
        );
        assert_eq!(graph.set("Missing", 1u8), Err(GraphError::UnknownProperty("Missing".into())));
        assert_eq!(graph.set("Len", 3usize), Err(GraphError::NotBaseProperty("Len".into())));
        assert!(matches!(graph.set("Name", 7u32), Err(GraphError::TypeMismatch { .. })));
        assert!(matches!(graph.get::<u32>("Name"), Err(GraphError::TypeMismatch { .. })));
    }

    #[test]
    fn test_diamond_recomputes_and_notifies_once() {
        let (graph, owner) = graph();
        let d_runs = Arc::new(AtomicUsize::new(0));

        graph.declare("A", 1i64).unwrap();
        graph.declare_computed("B", &["A"], |s| s.value::<i64>("A") + 1).unwrap();
        graph.declare_computed("C", &["A"], |s| s.value::<i64>("A") * 10).unwrap();
        let runs = d_runs.clone();
        graph
            .declare_computed("D", &["B", "C"], move |s| {
                runs.fetch_add(1, Ordering::SeqCst);
                s.value::<i64>("B") + s.value::<i64>("C")
            })
            .unwrap();
        d_runs.store(0, Ordering::SeqCst);

        let seen = record(&graph);
        graph.set("A", 2i64).unwrap();
        owner.flush();

        assert_eq!(d_runs.load(Ordering::SeqCst), 1);
        assert_eq!(graph.get::<i64>("D").unwrap(), 23);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first().map(String::as_str), Some("A"));
        assert_eq!(seen.last().map(String::as_str), Some("D"));
        for name in ["A", "B", "C", "D"] {
            assert_eq!(seen.iter().filter(|n| *n == name).count(), 1, "{} notified once", name);
        }
    }

    #[test]
    fn test_computed_current_while_owner_is_busy() {
        let (graph, owner) = graph();
        graph.declare("Count", 1u32).unwrap();
        graph
            .declare_computed("Double", &["Count"], |s| s.value::<u32>("Count") * 2)
            .unwrap();
        let seen = record(&graph);

        let (release, parked) = std::sync::mpsc::channel::<()>();
        owner.begin_invoke(Box::new(move || {
            let _ = parked.recv();
        }));

        graph.set("Count", 7u32).unwrap();
        assert_eq!(graph.get::<u32>("Double").unwrap(), 14);
        assert!(seen.lock().unwrap().is_empty());

        release.send(()).unwrap();
        owner.flush();
        assert_eq!(*seen.lock().unwrap(), vec!["Count", "Double"]);
    }

    #[test]
    fn test_set_if_changed_suppresses_equal_values() {
        let (graph, owner) = graph();
        graph.declare("Name", String::from("alice")).unwrap();
        let seen = record(&graph);

        assert!(!graph.set_if_changed("Name", String::from("alice")).unwrap());
        owner.flush();
        assert!(seen.lock().unwrap().is_empty());

        graph.set("Name", String::from("alice")).unwrap();
        owner.flush();
        assert_eq!(*seen.lock().unwrap(), vec!["Name".to_string()]);

        assert!(graph.set_if_changed("Name", String::from("bob")).unwrap());
        owner.flush();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_cycle_rejected_at_registration() {
        let (graph, _owner) = graph();
        graph.declare_computed("A", &["B"], |s| s.value::<u32>("B")).unwrap();
        let err = graph
            .declare_computed("B", &["A"], |s| s.value::<u32>("A"))
            .unwrap_err();
        assert_eq!(err, GraphError::Cycle(vec!["B".into(), "A".into(), "B".into()]));
        assert!(!graph.contains("B"));
        assert_eq!(graph.get::<u32>("A"), Err(GraphError::Unresolved("A".into())));

        let self_ref = graph.declare_computed("S", &["S"], |_| 0u32).unwrap_err();
        assert!(matches!(self_ref, GraphError::Cycle(_)));
    }

    #[test]
    fn test_forward_reference_resolves_on_declare() {
        let (graph, _owner) = graph();
        graph
            .declare_computed("Greeting", &["Name"], |s| format!("hi {}", s.value::<String>("Name")))
            .unwrap();
        graph.declare("Name", String::from("bob")).unwrap();
        assert_eq!(graph.get::<String>("Greeting").unwrap(), "hi bob");
    }

    #[test]
    fn test_notifications_arrive_on_owner_thread() {
        let (graph, owner) = graph();
        graph.declare("X", 0u32).unwrap();

        let on_owner = Arc::new(Mutex::new(Vec::new()));
        let sink = on_owner.clone();
        let check = owner.clone();
        graph.subscribe(move |_| sink.lock().unwrap().push(check.is_owner_thread()));

        let graph = Arc::new(graph);
        let writers: Vec<_> = (1..=4u32)
            .map(|i| {
                let graph = graph.clone();
                std::thread::spawn(move || graph.set("X", i).unwrap())
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        owner.flush();

        let on_owner = on_owner.lock().unwrap();
        assert_eq!(on_owner.len(), 4);
        assert!(on_owner.iter().all(|b| *b));
    }

    #[test]
    fn test_batch_is_one_wave() {
        let (graph, owner) = graph();
        let runs = Arc::new(AtomicUsize::new(0));
        graph.declare("W", 1u32).unwrap();
        graph.declare("H", 1u32).unwrap();
        let counter = runs.clone();
        graph
            .declare_computed("Area", &["W", "H"], move |s| {
                counter.fetch_add(1, Ordering::SeqCst);
                s.value::<u32>("W") * s.value::<u32>("H")
            })
            .unwrap();
        runs.store(0, Ordering::SeqCst);
        let seen = record(&graph);

        graph
            .batch(|b| {
                b.set("W", 3u32)?;
                b.set("H", 4u32)?;
                b.set("W", 5u32)
            })
            .unwrap();
        owner.flush();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(graph.get::<u32>("Area").unwrap(), 20);
        assert_eq!(*seen.lock().unwrap(), vec!["W", "H", "Area"]);
    }

    #[test]
    fn test_filtered_subscription_and_unsubscribe() {
        let (graph, owner) = graph();
        graph.declare("A", 0u8).unwrap();
        graph.declare("B", 0u8).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = graph.subscribe_to(&["B"], move |change| {
            sink.lock().unwrap().push(*change.value::<u8>().unwrap());
        });

        graph.set("A", 1u8).unwrap();
        graph.set("B", 2u8).unwrap();
        owner.flush();
        assert_eq!(*seen.lock().unwrap(), vec![2]);

        assert!(graph.unsubscribe(id));
        graph.set("B", 3u8).unwrap();
        owner.flush();
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_snapshot_hides_undeclared_dependencies() {
        let (graph, _owner) = graph();
        graph.declare("Secret", 42u32).unwrap();
        graph.declare("Seen", 1u32).unwrap();
        graph
            .declare_computed("Peek", &["Seen"], |s| s.get::<u32>("Secret").copied())
            .unwrap();
        assert_eq!(graph.get::<Option<u32>>("Peek").unwrap(), None);
    }
}
