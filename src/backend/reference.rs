//! Pull-based references and the revalidation cache.
//!
//! A [`Reference`] is either *constant* (its value is read once and the
//! reference can be thrown away) or *volatile* (backed by a [`Source`] whose
//! revision moves whenever the value may have changed). Opcodes never read a
//! volatile reference directly across passes; they wrap it in a
//! [`ReferenceCache`] and ask it to [`revalidate`](ReferenceCache::revalidate).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::value::Value;

/// Monotonic revision counter of a source.
pub type Revision = u64;

/// A value producer whose revision advances when the value may have changed.
pub trait Source<T> {
    /// Pull the current value.
    fn value(&self) -> T;

    /// Current revision. Equal revisions guarantee an equal value.
    fn revision(&self) -> Revision;
}

/// Handle to a possibly changing value.
pub enum Reference<T> {
    /// Never changes after creation
    Const(T),
    /// Must be re-pulled and compared on every update pass
    Volatile(Rc<dyn Source<T>>),
}

impl<T: Clone> Clone for Reference<T> {
    fn clone(&self) -> Self {
        match self {
            Reference::Const(value) => Reference::Const(value.clone()),
            Reference::Volatile(source) => Reference::Volatile(Rc::clone(source)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Const(value) => f.debug_tuple("Const").field(value).finish(),
            Reference::Volatile(source) => f
                .debug_struct("Volatile")
                .field("revision", &source.revision())
                .finish(),
        }
    }
}

impl<T: Clone> Reference<T> {
    pub fn constant(value: T) -> Self {
        Reference::Const(value)
    }

    pub fn volatile(source: Rc<dyn Source<T>>) -> Self {
        Reference::Volatile(source)
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Reference::Const(_))
    }

    /// Pull the current value.
    pub fn value(&self) -> T {
        match self {
            Reference::Const(value) => value.clone(),
            Reference::Volatile(source) => source.value(),
        }
    }

    /// Revision of the underlying source; constants are always at revision 0.
    pub fn revision(&self) -> Revision {
        match self {
            Reference::Const(_) => 0,
            Reference::Volatile(source) => source.revision(),
        }
    }
}

impl Reference<Value> {
    /// Reference to a property path below this one.
    ///
    /// A constant parent yields a constant child, so constant folding survives
    /// property access.
    pub fn get_path(&self, path: &[String]) -> Reference<Value> {
        if path.is_empty() {
            return self.clone();
        }
        match self {
            Reference::Const(value) => Reference::Const(value.get_path(path)),
            Reference::Volatile(source) => Reference::Volatile(Rc::new(PathSource {
                parent: Rc::clone(source),
                path: path.to_vec(),
            })),
        }
    }

    /// String concatenation of the parts' rendered values.
    pub fn concat(parts: Vec<Reference<Value>>) -> Reference<Value> {
        if parts.iter().all(Reference::is_const) {
            let joined: String = parts.iter().map(|p| p.value().to_string()).collect();
            return Reference::Const(Value::from(joined));
        }
        Reference::Volatile(Rc::new(ConcatSource { parts }))
    }
}

/// Host-mutable cell usable as a volatile source.
///
/// ```ignore
/// let cell = UpdatableReference::new(Value::from("red"));
/// let reference = UpdatableReference::reference(&cell);
/// cell.update(Value::from("blue"));
/// ```
#[derive(Debug)]
pub struct UpdatableReference<T> {
    value: RefCell<T>,
    revision: Cell<Revision>,
}

impl<T: Clone + 'static> UpdatableReference<T> {
    pub fn new(value: T) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(value),
            revision: Cell::new(1),
        })
    }

    /// Volatile reference reading from this cell.
    pub fn reference(cell: &Rc<Self>) -> Reference<T> {
        Reference::Volatile(Rc::clone(cell) as Rc<dyn Source<T>>)
    }

    /// Replace the value and bump the revision.
    pub fn update(&self, value: T) {
        *self.value.borrow_mut() = value;
        self.revision.set(self.revision.get() + 1);
    }

    /// Bump the revision without changing the value.
    pub fn dirty(&self) {
        self.revision.set(self.revision.get() + 1);
    }
}

impl<T: Clone> Source<T> for UpdatableReference<T> {
    fn value(&self) -> T {
        self.value.borrow().clone()
    }

    fn revision(&self) -> Revision {
        self.revision.get()
    }
}

struct PathSource {
    parent: Rc<dyn Source<Value>>,
    path: Vec<String>,
}

impl Source<Value> for PathSource {
    fn value(&self) -> Value {
        self.parent.value().get_path(&self.path)
    }

    fn revision(&self) -> Revision {
        self.parent.revision()
    }
}

struct ConcatSource {
    parts: Vec<Reference<Value>>,
}

impl Source<Value> for ConcatSource {
    fn value(&self) -> Value {
        let joined: String = self.parts.iter().map(|p| p.value().to_string()).collect();
        Value::from(joined)
    }

    // Part revisions only grow, so their sum moves whenever any part moves.
    fn revision(&self) -> Revision {
        self.parts.iter().map(Reference::revision).sum()
    }
}

/// Outcome of [`ReferenceCache::revalidate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    NotModified,
    Modified(T),
}

impl<T> Validation<T> {
    pub fn is_modified(&self) -> bool {
        matches!(self, Validation::Modified(_))
    }
}

/// Memoizing wrapper around a volatile source.
///
/// `peek` returns the last observed value without consuming a change;
/// `revalidate` pulls the source only when its revision moved and reports a
/// modification only when the pulled value differs from the last one.
pub struct ReferenceCache<T> {
    source: Rc<dyn Source<T>>,
    last: Option<(T, Revision)>,
}

impl<T: fmt::Debug> fmt::Debug for ReferenceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceCache")
            .field("last", &self.last)
            .finish()
    }
}

impl<T: Clone + PartialEq> ReferenceCache<T> {
    pub fn new(source: Rc<dyn Source<T>>) -> Self {
        Self { source, last: None }
    }

    /// Build a cache for a volatile reference. Constants have nothing to
    /// revalidate and yield `None`.
    pub fn for_reference(reference: &Reference<T>) -> Option<Self> {
        match reference {
            Reference::Const(_) => None,
            Reference::Volatile(source) => Some(Self::new(Rc::clone(source))),
        }
    }

    fn initialize(&mut self) -> T {
        let revision = self.source.revision();
        let value = self.source.value();
        self.last = Some((value.clone(), revision));
        value
    }

    /// Current best-known value.
    pub fn peek(&mut self) -> T {
        match &self.last {
            Some((value, _)) => value.clone(),
            None => self.initialize(),
        }
    }

    /// Check the source for a change since the last observation.
    pub fn revalidate(&mut self) -> Validation<T> {
        match &mut self.last {
            None => Validation::Modified(self.initialize()),
            Some((last_value, last_revision)) => {
                let revision = self.source.revision();
                if revision == *last_revision {
                    return Validation::NotModified;
                }
                *last_revision = revision;

                let value = self.source.value();
                if value == *last_value {
                    return Validation::NotModified;
                }
                *last_value = value.clone();
                Validation::Modified(value)
            }
        }
    }
}
