//! Component definitions and the pluggable manager capability.
//!
//! A host defines one [`ComponentManager`] per component kind. The VM never
//! sees a concrete component type: instances travel as the opaque
//! [`Component`] handle and are passed back into the manager's hooks.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use super::args::EvaluatedArgs;
use super::host::{ElementOperations, NodeId};
use super::reference::Reference;
use super::scope::DynamicScope;
use super::value::Value;
use super::vm::VmResult;

/// Opaque component instance. Only the manager that created it knows its
/// concrete type.
pub type Component = Rc<dyn Any>;

/// Release action for a component instance.
pub trait Destructor {
    fn destroy(&mut self);
}

impl<F: FnMut()> Destructor for F {
    fn destroy(&mut self) {
        self()
    }
}

/// Host-implemented strategy for one component kind.
pub trait ComponentManager {
    /// Create an instance for an invocation.
    fn create(
        &self,
        definition: &ComponentDefinition,
        args: &EvaluatedArgs,
        dynamic_scope: &DynamicScope,
    ) -> VmResult<Component>;

    /// Reference used as `self` in the component's layout. `None` is a
    /// contract violation and aborts the render.
    fn get_self(&self, component: &Component) -> Option<Reference<Value>>;

    /// Release action to run when the component is torn down.
    fn get_destructor(&self, component: &Component) -> Option<Box<dyn Destructor>>;

    /// Called once the component's root element exists, before the
    /// invocation closes.
    fn did_create_element(
        &self,
        component: &Component,
        element: NodeId,
        operations: &mut ElementOperations<'_>,
    );

    /// Called exactly once per update pass while the component is alive.
    fn update(
        &self,
        component: &Component,
        args: &EvaluatedArgs,
        dynamic_scope: &DynamicScope,
    ) -> VmResult<()>;
}

/// Immutable descriptor of a component kind.
pub struct ComponentDefinition {
    pub name: String,
    pub manager: Rc<dyn ComponentManager>,
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Shared handle to a definition. Equality is identity: two handles are
/// equal only when they point at the same definition.
#[derive(Debug, Clone)]
pub struct DefinitionHandle(Rc<ComponentDefinition>);

impl DefinitionHandle {
    pub fn new(name: impl Into<String>, manager: Rc<dyn ComponentManager>) -> Self {
        Self(Rc::new(ComponentDefinition {
            name: name.into(),
            manager,
        }))
    }

    pub fn manager(&self) -> Rc<dyn ComponentManager> {
        Rc::clone(&self.0.manager)
    }

    pub fn ptr_eq(&self, other: &DefinitionHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for DefinitionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for DefinitionHandle {}

impl Deref for DefinitionHandle {
    type Target = ComponentDefinition;

    fn deref(&self) -> &ComponentDefinition {
        &self.0
    }
}

/// Runs its destructor exactly once, on `destroy` or on drop, whichever
/// comes first.
pub struct DestroyGuard {
    name: String,
    destructor: Option<Box<dyn Destructor>>,
}

impl DestroyGuard {
    pub fn new(name: impl Into<String>, destructor: Box<dyn Destructor>) -> Self {
        Self {
            name: name.into(),
            destructor: Some(destructor),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn destroy(&mut self) {
        if let Some(mut destructor) = self.destructor.take() {
            tracing::debug!(target: "rendervm::vm::component", component = %self.name, "destroy");
            destructor.destroy();
        }
    }
}

impl Drop for DestroyGuard {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for DestroyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyGuard")
            .field("name", &self.name)
            .field("pending", &self.destructor.is_some())
            .finish()
    }
}

/// Release actions owned by a render. Dropping the list runs every pending
/// guard in reverse registration order, so nested components are released
/// before the components that contain them.
#[derive(Debug, Default)]
pub struct DestroyableList {
    guards: Vec<DestroyGuard>,
}

impl DestroyableList {
    pub fn push(&mut self, guard: DestroyGuard) {
        self.guards.push(guard);
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.guards.iter().map(DestroyGuard::name)
    }

    pub fn destroy_all(&mut self) {
        while let Some(mut guard) = self.guards.pop() {
            guard.destroy();
        }
    }
}

impl Drop for DestroyableList {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_destroyable_list_runs_in_reverse() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut list = DestroyableList::default();
        for name in ["outer", "inner"] {
            let order = Rc::clone(&order);
            list.push(DestroyGuard::new(name, Box::new(move || order.borrow_mut().push(name))));
        }
        assert_eq!(list.names().collect::<Vec<_>>(), vec!["outer", "inner"]);

        drop(list);
        assert_eq!(*order.borrow(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_destroy_guard_runs_once() {
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let mut guard = DestroyGuard::new("x", Box::new(move || seen.set(seen.get() + 1)));

        guard.destroy();
        guard.destroy();
        drop(guard);

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_destroy_guard_runs_on_drop() {
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        {
            let _guard = DestroyGuard::new("x", Box::new(move || seen.set(seen.get() + 1)));
        }
        assert_eq!(count.get(), 1);
    }
}
