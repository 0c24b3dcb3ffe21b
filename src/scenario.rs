//! Scenario files for the `rendervm` CLI.
//!
//! A scenario declares component kinds, the invocations to render and a
//! sequence of input changes to replay as update passes. Every component kind
//! is served by the built-in [`ScenarioManager`].
//!
//! ## Format
//!
//! ```toml
//! [vm]
//! trace = false
//!
//! [inputs]
//! color = "red"
//! which = "card"
//!
//! [[component]]
//! name = "card"
//! tag = "div"
//! attributes = { class = "card" }
//! content = "title"        # named argument rendered as text
//! yield = true             # render the caller's block
//!
//! [[invoke]]
//! component = "card"
//! args = { title = "Hello", class = "@color" }   # "@name" reads an input
//! shadow = ["class"]
//! block = "body text"
//!
//! [[invoke]]
//! dynamic = true
//! component = "@which"
//! args = { title = "Dynamic" }
//!
//! [[update]]
//! color = "blue"
//! ```

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use serde::Deserialize;
use tracing::debug;

use crate::backend::args::{CompiledArgs, EvaluatedArgs, Expression};
use crate::backend::component::{
    Component, ComponentDefinition, ComponentManager, DefinitionHandle, Destructor,
};
use crate::backend::environment::{Block, BlockKind, Environment, Layout, LayoutRegistry, Templates};
use crate::backend::host::{ElementOperations, NodeId};
use crate::backend::opcodes::{DynamicComponentFactory, Opcode};
use crate::backend::reference::{Reference, Revision, Source, UpdatableReference};
use crate::backend::scope::DynamicScope;
use crate::backend::value::Value;
use crate::backend::vm::{RenderResult, RenderVm, VmConfig, VmError, VmResult};

/// Errors raised while loading, compiling or running a scenario.
#[derive(Debug)]
pub enum ScenarioError {
    Io { path: String, message: String },
    Parse(String),
    UnknownComponent(String),
    UnknownInput(String),
    UnsupportedValue { key: String, kind: &'static str },
    Vm(VmError),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "Failed to read '{}': {}", path, message),
            Self::Parse(msg) => write!(f, "Invalid scenario: {}", msg),
            Self::UnknownComponent(name) => write!(f, "Unknown component: {}", name),
            Self::UnknownInput(name) => write!(f, "Unknown input: @{}", name),
            Self::UnsupportedValue { key, kind } => {
                write!(f, "Unsupported {} value for '{}'", kind, key)
            }
            Self::Vm(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ScenarioError {}

impl From<VmError> for ScenarioError {
    fn from(err: VmError) -> Self {
        ScenarioError::Vm(err)
    }
}

// === File Format ===

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub vm: VmConfig,

    /// Mutable host inputs, referenced from args as `@name`
    #[serde(default)]
    pub inputs: BTreeMap<String, toml::Value>,

    #[serde(default, rename = "component")]
    pub components: Vec<ComponentSpec>,

    #[serde(default, rename = "invoke")]
    pub invocations: Vec<InvocationSpec>,

    /// Input assignments applied before each update pass
    #[serde(default, rename = "update")]
    pub updates: Vec<BTreeMap<String, toml::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Named argument rendered as the element's text
    pub content: Option<String>,
    #[serde(default, rename = "yield")]
    pub yields: bool,
}

fn default_tag() -> String {
    "div".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvocationSpec {
    /// Component name, or `@input` naming it for dynamic invocations
    pub component: String,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub args: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub shadow: Vec<String>,
    /// Text of the caller's default block
    pub block: Option<String>,
    /// Text of the caller's inverse block
    pub inverse: Option<String>,
}

impl Scenario {
    pub fn parse(content: &str) -> Result<Self, ScenarioError> {
        toml::from_str(content).map_err(|e| ScenarioError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|e| ScenarioError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Build layouts, inputs and the render program.
    pub fn compile(&self) -> Result<CompiledScenario, ScenarioError> {
        let manager = Rc::new(ScenarioManager::default());

        let mut inputs = BTreeMap::new();
        for (name, value) in &self.inputs {
            inputs.insert(name.clone(), UpdatableReference::new(to_value(name, value)?));
        }

        let mut layouts = LayoutRegistry::new();
        let mut definitions = BTreeMap::new();
        for spec in &self.components {
            layouts.register(compile_layout(spec));
            let handle = DefinitionHandle::new(spec.name.as_str(), manager.clone());
            definitions.insert(spec.name.clone(), handle);
        }
        let definitions = Rc::new(definitions);

        let mut program = Vec::new();
        for spec in &self.invocations {
            compile_invocation(spec, &inputs, &definitions, &manager, &mut program)?;
        }

        for step in &self.updates {
            for name in step.keys() {
                if !inputs.contains_key(name) {
                    return Err(ScenarioError::UnknownInput(name.clone()));
                }
            }
        }

        debug!(
            target: "rendervm::scenario",
            components = definitions.len(),
            opcodes = program.len(),
            steps = self.updates.len(),
            "compiled scenario"
        );

        Ok(CompiledScenario {
            config: self.vm.clone(),
            env: Rc::new(ScenarioEnvironment { layouts }),
            program,
            inputs,
            updates: self.updates.clone(),
            manager,
        })
    }
}

fn to_value(key: &str, value: &toml::Value) -> Result<Value, ScenarioError> {
    match value {
        toml::Value::String(s) => Ok(Value::from(s.as_str())),
        toml::Value::Integer(n) => Ok(Value::Int(*n)),
        toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
        other => Err(ScenarioError::UnsupportedValue {
            key: key.to_string(),
            kind: other.type_str(),
        }),
    }
}

fn compile_layout(spec: &ComponentSpec) -> Layout {
    let mut body = vec![Opcode::open_element(spec.tag.as_str())];
    for (name, value) in &spec.attributes {
        body.push(Opcode::static_attr(name.as_str(), value.as_str()));
    }
    body.push(Opcode::did_create_element());
    body.push(Opcode::shadow_attributes());
    body.push(Opcode::flush_element());
    if let Some(content) = &spec.content {
        body.push(Opcode::dynamic_content(Expression::arg(content.as_str())));
    }
    if spec.yields {
        body.push(Opcode::yield_block(BlockKind::Default));
    }
    body.push(Opcode::close_element());
    Layout::new(spec.name.as_str(), 0, body)
}

fn input_name(text: &str) -> Option<&str> {
    text.strip_prefix('@')
}

fn compile_invocation(
    spec: &InvocationSpec,
    inputs: &BTreeMap<String, Rc<UpdatableReference<Value>>>,
    definitions: &Rc<BTreeMap<String, DefinitionHandle>>,
    manager: &Rc<ScenarioManager>,
    program: &mut Vec<Opcode>,
) -> Result<(), ScenarioError> {
    let mut named = Vec::with_capacity(spec.args.len());
    for (key, value) in &spec.args {
        let expression = match value {
            toml::Value::String(s) => match input_name(s) {
                Some(input) => {
                    let cell = inputs
                        .get(input)
                        .ok_or_else(|| ScenarioError::UnknownInput(input.to_string()))?;
                    Expression::Ref(UpdatableReference::reference(cell))
                }
                None => Expression::literal(s.as_str()),
            },
            other => Expression::Literal(to_value(key, other)?),
        };
        named.push((key.clone(), expression));
    }
    let args = CompiledArgs::named(named);

    let templates = Templates {
        default: spec
            .block
            .as_ref()
            .map(|text| Rc::new(Block::new(vec![Opcode::text(text.as_str())]))),
        inverse: spec
            .inverse
            .as_ref()
            .map(|text| Rc::new(Block::new(vec![Opcode::text(text.as_str())]))),
    };

    if !spec.dynamic {
        let definition = definitions
            .get(&spec.component)
            .ok_or_else(|| ScenarioError::UnknownComponent(spec.component.clone()))?;
        program.push(Opcode::open_component(
            definition.clone(),
            args,
            spec.shadow.clone(),
            templates,
        ));
        program.push(Opcode::close_component());
        return Ok(());
    }

    let reference = match input_name(&spec.component) {
        Some(input) => {
            let cell = inputs
                .get(input)
                .ok_or_else(|| ScenarioError::UnknownInput(input.to_string()))?;
            Reference::volatile(Rc::new(DefinitionSource {
                input: Rc::clone(cell),
                definitions: Rc::clone(definitions),
                manager: Rc::clone(manager),
            }) as Rc<dyn Source<DefinitionHandle>>)
        }
        None => Reference::constant(
            definitions
                .get(&spec.component)
                .cloned()
                .ok_or_else(|| ScenarioError::UnknownComponent(spec.component.clone()))?,
        ),
    };

    program.push(Opcode::put_args(args));
    program.push(Opcode::put_component_definition(DynamicComponentFactory::new(
        move |_args, _vm| Ok(reference.clone()),
    )));
    program.push(Opcode::open_dynamic_component(spec.shadow.clone(), templates));
    program.push(Opcode::close_component());
    Ok(())
}

/// Resolves a component name held in an input to its definition.
///
/// A name with no registered definition resolves to a fresh, unregistered
/// definition, so an identity check against the rendered one fails.
struct DefinitionSource {
    input: Rc<UpdatableReference<Value>>,
    definitions: Rc<BTreeMap<String, DefinitionHandle>>,
    manager: Rc<ScenarioManager>,
}

impl Source<DefinitionHandle> for DefinitionSource {
    fn value(&self) -> DefinitionHandle {
        let name = self.input.value().to_string();
        match self.definitions.get(&name) {
            Some(handle) => handle.clone(),
            None => DefinitionHandle::new(name, self.manager.clone()),
        }
    }

    fn revision(&self) -> Revision {
        self.input.revision()
    }
}

// === Running ===

/// A scenario ready to render.
pub struct CompiledScenario {
    config: VmConfig,
    env: Rc<ScenarioEnvironment>,
    program: Vec<Opcode>,
    inputs: BTreeMap<String, Rc<UpdatableReference<Value>>>,
    updates: Vec<BTreeMap<String, toml::Value>>,
    manager: Rc<ScenarioManager>,
}

impl CompiledScenario {
    pub fn program(&self) -> &[Opcode] {
        &self.program
    }

    pub fn steps(&self) -> usize {
        self.updates.len()
    }

    pub fn stats(&self) -> ManagerStats {
        self.manager.stats()
    }

    pub fn render(&self) -> Result<RenderResult, ScenarioError> {
        let vm = RenderVm::with_config(
            self.env.clone(),
            Reference::constant(Value::Null),
            self.config.clone(),
        );
        Ok(vm.render(&self.program)?)
    }

    /// Apply the input assignments of update step `index`. Steps past the
    /// end change nothing.
    pub fn apply_step(&self, index: usize) -> Result<(), ScenarioError> {
        let Some(step) = self.updates.get(index) else {
            return Ok(());
        };
        for (name, value) in step {
            let cell = self
                .inputs
                .get(name)
                .ok_or_else(|| ScenarioError::UnknownInput(name.clone()))?;
            cell.update(to_value(name, value)?);
        }
        debug!(target: "rendervm::scenario", step = index, inputs = step.len(), "applied update step");
        Ok(())
    }
}

/// Environment serving the scenario's layouts and logging lifecycle hooks.
struct ScenarioEnvironment {
    layouts: LayoutRegistry,
}

impl Environment for ScenarioEnvironment {
    fn layout_for(&self, definition: &ComponentDefinition) -> VmResult<Rc<Layout>> {
        self.layouts
            .get(&definition.name)
            .ok_or_else(|| VmError::Layout(format!("no layout for component '{}'", definition.name)))
    }

    fn did_create(&self, component: &Component, _manager: &Rc<dyn ComponentManager>) {
        if let Some(instance) = component.downcast_ref::<ScenarioComponent>() {
            debug!(target: "rendervm::scenario", component = %instance.name, "did create");
        }
    }

    fn did_update(&self, component: &Component, _manager: &Rc<dyn ComponentManager>) {
        if let Some(instance) = component.downcast_ref::<ScenarioComponent>() {
            debug!(target: "rendervm::scenario", component = %instance.name, "did update");
        }
    }
}

// === Manager ===

/// Lifecycle counters of a [`ScenarioManager`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
}

/// Component instance created by [`ScenarioManager`].
#[derive(Debug)]
pub struct ScenarioComponent {
    pub name: String,
    /// Named argument values at creation time
    pub initial: Vec<(String, Value)>,
}

/// Generic manager: `self` is an object of the creation-time arguments and
/// the root element is tagged with `data-component`.
#[derive(Debug, Default)]
pub struct ScenarioManager {
    created: Cell<usize>,
    updated: Cell<usize>,
    destroyed: Rc<Cell<usize>>,
}

impl ScenarioManager {
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            created: self.created.get(),
            updated: self.updated.get(),
            destroyed: self.destroyed.get(),
        }
    }
}

impl ComponentManager for ScenarioManager {
    fn create(
        &self,
        definition: &ComponentDefinition,
        args: &EvaluatedArgs,
        _dynamic_scope: &DynamicScope,
    ) -> VmResult<Component> {
        self.created.set(self.created.get() + 1);
        Ok(Rc::new(ScenarioComponent {
            name: definition.name.clone(),
            initial: args.named_values(),
        }))
    }

    fn get_self(&self, component: &Component) -> Option<Reference<Value>> {
        let instance = component.downcast_ref::<ScenarioComponent>()?;
        Some(Reference::constant(Value::object(instance.initial.iter().cloned())))
    }

    fn get_destructor(&self, _component: &Component) -> Option<Box<dyn Destructor>> {
        let destroyed = Rc::clone(&self.destroyed);
        Some(Box::new(move || destroyed.set(destroyed.get() + 1)))
    }

    fn did_create_element(
        &self,
        component: &Component,
        _element: NodeId,
        operations: &mut ElementOperations<'_>,
    ) {
        if let Some(instance) = component.downcast_ref::<ScenarioComponent>() {
            operations.set_attribute("data-component", &instance.name);
        }
    }

    fn update(
        &self,
        component: &Component,
        _args: &EvaluatedArgs,
        _dynamic_scope: &DynamicScope,
    ) -> VmResult<()> {
        if component.downcast_ref::<ScenarioComponent>().is_none() {
            return Err(VmError::Manager("foreign component instance".to_string()));
        }
        self.updated.set(self.updated.get() + 1);
        Ok(())
    }
}
