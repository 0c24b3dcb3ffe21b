//! Lexical and dynamic scopes.
//!
//! The lexical [`Scope`] holds a component's `self` reference in slot 0 and
//! its symbol bindings after it. The [`DynamicScope`] carries ambient values
//! that nested components inherit unless they override them; it is shared,
//! so the snapshot an update opcode keeps observes writes made after render.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use smallvec::SmallVec;

use super::reference::Reference;
use super::value::Value;

/// Lexical scope frame.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    slots: SmallVec<[Option<Reference<Value>>; 8]>,
}

impl Scope {
    /// Scope rooted at `self_ref`, with room for `symbols` further bindings.
    pub fn root(self_ref: Reference<Value>, symbols: usize) -> Self {
        let mut slots = SmallVec::with_capacity(symbols + 1);
        slots.push(Some(self_ref));
        slots.resize(symbols + 1, None);
        Self { slots }
    }

    pub fn get_self(&self) -> Option<&Reference<Value>> {
        self.get(0)
    }

    pub fn get(&self, symbol: usize) -> Option<&Reference<Value>> {
        self.slots.get(symbol).and_then(Option::as_ref)
    }

    /// Bind `symbol`, growing the frame if the symbol table was undersized.
    pub fn bind(&mut self, symbol: usize, value: Reference<Value>) {
        if symbol >= self.slots.len() {
            self.slots.resize(symbol + 1, None);
        }
        self.slots[symbol] = Some(value);
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }
}

/// Ambient contextual values, inherited by nested invocations.
#[derive(Debug, Clone, Default)]
pub struct DynamicScope {
    bag: Rc<RefCell<BTreeMap<String, Reference<Value>>>>,
}

impl DynamicScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new scope starting with a copy of this one's values. Writes to the
    /// child never reach the parent.
    pub fn child(&self) -> Self {
        Self {
            bag: Rc::new(RefCell::new(self.bag.borrow().clone())),
        }
    }

    pub fn get(&self, key: &str) -> Option<Reference<Value>> {
        self.bag.borrow().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Reference<Value>) {
        self.bag.borrow_mut().insert(key.into(), value);
    }

    /// Whether two handles share storage.
    pub fn same_scope(&self, other: &DynamicScope) -> bool {
        Rc::ptr_eq(&self.bag, &other.bag)
    }
}
