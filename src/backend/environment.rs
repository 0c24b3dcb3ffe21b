//! Environment hooks and compiled layouts.

use std::collections::HashMap;
use std::rc::Rc;

use super::component::{Component, ComponentDefinition, ComponentManager};
use super::opcodes::Opcode;
use super::vm::{VmError, VmResult};

/// A compiled list of render opcodes, e.g. a caller-supplied block.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub opcodes: Vec<Opcode>,
}

impl Block {
    pub fn new(opcodes: Vec<Opcode>) -> Self {
        Self { opcodes }
    }
}

/// Which caller template a `Yield` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Default,
    Inverse,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Default => "default",
            BlockKind::Inverse => "inverse",
        }
    }
}

/// Blocks passed from an invocation site into the component's layout.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pub default: Option<Rc<Block>>,
    pub inverse: Option<Rc<Block>>,
}

impl Templates {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_default(block: Block) -> Self {
        Self {
            default: Some(Rc::new(block)),
            inverse: None,
        }
    }

    pub fn get(&self, kind: BlockKind) -> Option<&Rc<Block>> {
        match kind {
            BlockKind::Default => self.default.as_ref(),
            BlockKind::Inverse => self.inverse.as_ref(),
        }
    }

    pub fn has(&self, kind: BlockKind) -> bool {
        self.get(kind).is_some()
    }
}

/// Compiled body of a component kind.
#[derive(Debug, Clone)]
pub struct Layout {
    pub name: String,
    /// Number of symbol slots after `self`
    pub symbols: usize,
    pub body: Vec<Opcode>,
}

impl Layout {
    pub fn new(name: impl Into<String>, symbols: usize, body: Vec<Opcode>) -> Self {
        Self {
            name: name.into(),
            symbols,
            body,
        }
    }
}

/// Host environment the VM reports to and resolves layouts from.
pub trait Environment {
    /// Resolve the compiled layout for a definition.
    fn layout_for(&self, definition: &ComponentDefinition) -> VmResult<Rc<Layout>>;

    fn did_create(&self, _component: &Component, _manager: &Rc<dyn ComponentManager>) {}

    fn did_update(&self, _component: &Component, _manager: &Rc<dyn ComponentManager>) {}
}

/// Layouts keyed by component name.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
    layouts: HashMap<String, Rc<Layout>>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, layout: Layout) {
        self.layouts.insert(layout.name.clone(), Rc::new(layout));
    }

    pub fn get(&self, name: &str) -> Option<Rc<Layout>> {
        self.layouts.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

/// Environment backed by a [`LayoutRegistry`] with no-op hooks.
#[derive(Debug, Clone, Default)]
pub struct BasicEnvironment {
    pub layouts: LayoutRegistry,
}

impl BasicEnvironment {
    pub fn new(layouts: LayoutRegistry) -> Self {
        Self { layouts }
    }
}

impl Environment for BasicEnvironment {
    fn layout_for(&self, definition: &ComponentDefinition) -> VmResult<Rc<Layout>> {
        self.layouts
            .get(&definition.name)
            .ok_or_else(|| VmError::Layout(format!("no layout for component '{}'", definition.name)))
    }
}
