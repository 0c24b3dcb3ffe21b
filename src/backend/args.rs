//! Invocation arguments.
//!
//! [`Expression`] nodes arrive already built from the wire format; this
//! module only evaluates them against the running VM. Evaluated arguments
//! are reference counted so the invocation, its layout frame and its update
//! opcode all observe the same argument object.

use std::rc::Rc;

use super::environment::BlockKind;
use super::reference::Reference;
use super::value::Value;
use super::vm::{RenderVm, VmError, VmResult};

/// Evaluable expression node.
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    /// Named argument of the current invocation (`@name`)
    Arg(String),
    /// Lexical symbol, followed by a property path (`this.user.name`)
    Get { symbol: usize, path: Vec<String> },
    Concat(Vec<Expression>),
    HasBlock(BlockKind),
    /// Host-supplied reference
    Ref(Reference<Value>),
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn arg(name: impl Into<String>) -> Self {
        Expression::Arg(name.into())
    }

    /// `self.<path>`
    pub fn self_path<S: Into<String>>(path: impl IntoIterator<Item = S>) -> Self {
        Expression::Get {
            symbol: 0,
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    pub fn evaluate(&self, vm: &RenderVm) -> VmResult<Reference<Value>> {
        match self {
            Expression::Literal(value) => Ok(Reference::constant(value.clone())),
            Expression::Arg(name) => Ok(vm
                .frame()
                .args()
                .and_then(|args| args.named.get(name))
                .unwrap_or_else(|| Reference::constant(Value::Null))),
            Expression::Get { symbol, path } => {
                let base = vm
                    .scope()
                    .get(*symbol)
                    .ok_or(VmError::UnknownSymbol(*symbol))?;
                Ok(base.get_path(path))
            }
            Expression::Concat(parts) => {
                let parts = parts
                    .iter()
                    .map(|part| part.evaluate(vm))
                    .collect::<VmResult<Vec<_>>>()?;
                Ok(Reference::concat(parts))
            }
            Expression::HasBlock(kind) => Ok(Reference::constant(Value::Bool(
                vm.frame().templates().has(*kind),
            ))),
            Expression::Ref(reference) => Ok(reference.clone()),
        }
    }
}

/// Arguments as compiled at the invocation site.
#[derive(Debug, Clone, Default)]
pub struct CompiledArgs {
    pub positional: Vec<Expression>,
    pub named: Vec<(String, Expression)>,
}

impl CompiledArgs {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn named<K: Into<String>>(named: impl IntoIterator<Item = (K, Expression)>) -> Self {
        Self {
            positional: Vec::new(),
            named: named.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn evaluate(&self, vm: &RenderVm) -> VmResult<EvaluatedArgs> {
        let positional = self
            .positional
            .iter()
            .map(|expr| expr.evaluate(vm))
            .collect::<VmResult<Vec<_>>>()?;
        let named = self
            .named
            .iter()
            .map(|(name, expr)| Ok((name.clone(), expr.evaluate(vm)?)))
            .collect::<VmResult<Vec<_>>>()?;
        Ok(EvaluatedArgs::new(positional, named))
    }
}

/// Realized named arguments, in call-site order.
#[derive(Debug, Clone)]
pub struct NamedArgs {
    entries: Rc<[(String, Reference<Value>)]>,
}

impl Default for NamedArgs {
    fn default() -> Self {
        Self {
            entries: Rc::from(Vec::new()),
        }
    }
}

impl NamedArgs {
    pub fn get(&self, name: &str) -> Option<Reference<Value>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r.clone())
    }

    /// Current value of a named argument, `Null` when absent.
    pub fn value(&self, name: &str) -> Value {
        self.get(name).map(|r| r.value()).unwrap_or(Value::Null)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Realized snapshot of an invocation's arguments.
#[derive(Debug, Clone)]
pub struct EvaluatedArgs {
    pub positional: Rc<[Reference<Value>]>,
    pub named: NamedArgs,
}

impl EvaluatedArgs {
    pub fn new(positional: Vec<Reference<Value>>, named: Vec<(String, Reference<Value>)>) -> Self {
        Self {
            positional: positional.into(),
            named: NamedArgs {
                entries: named.into(),
            },
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn at(&self, index: usize) -> Option<&Reference<Value>> {
        self.positional.get(index)
    }

    /// Whether both handles share the same realized arguments.
    pub fn same_args(&self, other: &EvaluatedArgs) -> bool {
        Rc::ptr_eq(&self.positional, &other.positional)
            && Rc::ptr_eq(&self.named.entries, &other.named.entries)
    }

    /// Current values of all named arguments.
    pub fn named_values(&self) -> Vec<(String, Value)> {
        self.named
            .entries
            .iter()
            .map(|(n, r)| (n.clone(), r.value()))
            .collect()
    }
}
