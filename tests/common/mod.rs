//! Test utilities for component lifecycle integration tests
//!
//! This module provides shared fixtures for integration tests, including:
//! - A recording component manager that logs every hook call
//! - A recording environment with a mutable layout registry
//! - Layout builders for simple single-element components

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rendervm::backend::*;

/// Observable lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Create {
        definition: String,
        args: Vec<(String, Value)>,
        /// `theme` as seen in the invocation's dynamic scope
        theme: Value,
        /// `owner` written by an enclosing invocation, if any
        owner: Value,
    },
    DidCreateElement {
        definition: String,
        element: NodeId,
        class: Option<String>,
    },
    Update {
        definition: String,
    },
    Destroy {
        definition: String,
    },
    EnvDidCreate {
        definition: String,
    },
    EnvDidUpdate {
        definition: String,
    },
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Instance created by [`RecordingManager`].
#[derive(Debug)]
pub struct Recorded {
    pub definition: String,
    pub serial: usize,
}

/// Manager that records every hook invocation into a shared log.
///
/// Each created component writes `owner = <definition>` into its own dynamic
/// scope, so tests can check that writes stay local to the invocation.
pub struct RecordingManager {
    log: EventLog,
    serial: Cell<usize>,
    pub omit_self: Cell<bool>,
    pub fail_update: Cell<bool>,
}

impl RecordingManager {
    pub fn new(log: EventLog) -> Rc<Self> {
        Rc::new(Self {
            log,
            serial: Cell::new(0),
            omit_self: Cell::new(false),
            fail_update: Cell::new(false),
        })
    }
}

impl ComponentManager for RecordingManager {
    fn create(
        &self,
        definition: &ComponentDefinition,
        args: &EvaluatedArgs,
        dynamic_scope: &DynamicScope,
    ) -> VmResult<Component> {
        let theme = dynamic_scope
            .get("theme")
            .map(|r| r.value())
            .unwrap_or(Value::Null);
        let owner = dynamic_scope
            .get("owner")
            .map(|r| r.value())
            .unwrap_or(Value::Null);
        dynamic_scope.set("owner", Reference::constant(Value::from(definition.name.as_str())));

        self.log.borrow_mut().push(Event::Create {
            definition: definition.name.clone(),
            args: args.named_values(),
            theme,
            owner,
        });
        let serial = self.serial.get() + 1;
        self.serial.set(serial);
        Ok(Rc::new(Recorded {
            definition: definition.name.clone(),
            serial,
        }))
    }

    fn get_self(&self, component: &Component) -> Option<Reference<Value>> {
        if self.omit_self.get() {
            return None;
        }
        let recorded = component.downcast_ref::<Recorded>()?;
        Some(Reference::constant(Value::object([
            ("definition", Value::from(recorded.definition.as_str())),
            ("serial", Value::Int(recorded.serial as i64)),
        ])))
    }

    fn get_destructor(&self, component: &Component) -> Option<Box<dyn Destructor>> {
        let definition = component.downcast_ref::<Recorded>()?.definition.clone();
        let log = Rc::clone(&self.log);
        Some(Box::new(move || {
            log.borrow_mut().push(Event::Destroy {
                definition: definition.clone(),
            })
        }))
    }

    fn did_create_element(
        &self,
        component: &Component,
        element: NodeId,
        operations: &mut ElementOperations<'_>,
    ) {
        let definition = definition_of(component);
        self.log.borrow_mut().push(Event::DidCreateElement {
            definition,
            element,
            class: operations.attribute("class").map(str::to_string),
        });
    }

    fn update(
        &self,
        component: &Component,
        _args: &EvaluatedArgs,
        _dynamic_scope: &DynamicScope,
    ) -> VmResult<()> {
        if self.fail_update.get() {
            return Err(VmError::Manager("update refused".to_string()));
        }
        self.log.borrow_mut().push(Event::Update {
            definition: definition_of(component),
        });
        Ok(())
    }
}

fn definition_of(component: &Component) -> String {
    component
        .downcast_ref::<Recorded>()
        .map(|r| r.definition.clone())
        .unwrap_or_default()
}

/// Environment whose layouts can be registered after it is shared.
pub struct RecordingEnvironment {
    layouts: RefCell<LayoutRegistry>,
    log: EventLog,
}

impl RecordingEnvironment {
    pub fn register(&self, layout: Layout) {
        self.layouts.borrow_mut().register(layout);
    }
}

impl Environment for RecordingEnvironment {
    fn layout_for(&self, definition: &ComponentDefinition) -> VmResult<Rc<Layout>> {
        self.layouts
            .borrow()
            .get(&definition.name)
            .ok_or_else(|| VmError::Layout(format!("no layout for '{}'", definition.name)))
    }

    fn did_create(&self, component: &Component, _manager: &Rc<dyn ComponentManager>) {
        self.log.borrow_mut().push(Event::EnvDidCreate {
            definition: definition_of(component),
        });
    }

    fn did_update(&self, component: &Component, _manager: &Rc<dyn ComponentManager>) {
        self.log.borrow_mut().push(Event::EnvDidUpdate {
            definition: definition_of(component),
        });
    }
}

/// Shared environment, manager and event log for one test.
pub struct Harness {
    pub env: Rc<RecordingEnvironment>,
    pub manager: Rc<RecordingManager>,
    pub log: EventLog,
}

impl Harness {
    pub fn new() -> Self {
        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        Self {
            env: Rc::new(RecordingEnvironment {
                layouts: RefCell::new(LayoutRegistry::new()),
                log: Rc::clone(&log),
            }),
            manager: RecordingManager::new(Rc::clone(&log)),
            log,
        }
    }

    /// Define a component kind rendered by [`element_layout`].
    pub fn define(&self, name: &str, tag: &str) -> DefinitionHandle {
        self.env.register(element_layout(name, tag));
        DefinitionHandle::new(name, self.manager.clone())
    }

    pub fn vm(&self) -> RenderVm {
        RenderVm::new(self.env.clone(), Reference::constant(Value::Null))
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.log.borrow().iter().filter(|e| matches(e)).count()
    }
}

/// `<tag class="<name>">{{@name}}</tag>` with the manager hook and shadow
/// attributes applied before the element is flushed.
pub fn element_layout(name: &str, tag: &str) -> Layout {
    Layout::new(
        name,
        0,
        vec![
            Opcode::open_element(tag),
            Opcode::static_attr("class", name),
            Opcode::did_create_element(),
            Opcode::shadow_attributes(),
            Opcode::flush_element(),
            Opcode::dynamic_content(Expression::arg("name")),
            Opcode::close_element(),
        ],
    )
}

pub fn invoke(
    definition: &DefinitionHandle,
    named: Vec<(&str, Expression)>,
    shadow: &[&str],
) -> Vec<Opcode> {
    vec![
        Opcode::open_component(
            definition.clone(),
            CompiledArgs::named(named),
            shadow.iter().map(|s| s.to_string()).collect(),
            Templates::empty(),
        ),
        Opcode::close_component(),
    ]
}

/// Names of the components the updating program will update, in order.
pub fn update_order(result: &RenderResult) -> Vec<String> {
    result
        .updating_opcodes()
        .iter()
        .filter_map(|op| match op {
            UpdatingOpcode::UpdateComponent { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}
