//! The tree-query seam between the rule engine and a host frontend.
//!
//! The engine never touches a concrete syntax tree. Everything it needs is
//! expressed through [`TreeQuery`], so any frontend that can answer these
//! questions (parent pointers, callee resolution, conditional shape) can be
//! checked with the same rules.

use serde::Serialize;

use super::annotations::AnnotationSet;

/// A source position, owned by the host's translation unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    /// Byte offset of the start of the node.
    pub offset: u32,
    /// Length of the node in bytes.
    pub len: u32,
    /// Zero-indexed line.
    pub line: u32,
    /// Zero-indexed column, in characters.
    pub column: u32,
}

/// What a declaration names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    /// A function item, method, or foreign function.
    Function,
    /// A `static` or `const` item.
    Variable,
    /// A `let` binding or parameter.
    Local,
    /// A name brought into scope by `use`.
    Imported,
    /// A path the unit does not declare (glob import, other crate).
    External,
}

/// A named function or variable known to the host frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    pub location: Location,
    pub annotations: AnnotationSet,
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclKind, location: Location) -> Self {
        Self {
            name: name.into(),
            kind,
            location,
            annotations: AnnotationSet::default(),
        }
    }

    pub fn with_annotations(mut self, annotations: AnnotationSet) -> Self {
        self.annotations = annotations;
        self
    }

    /// True when calling this declaration is a direct call.
    pub fn is_callable(&self) -> bool {
        !matches!(self.kind, DeclKind::Local)
    }

    /// True when this declaration may name a function: a function item, an
    /// import, or a path the unit does not declare.
    pub fn is_function_like(&self) -> bool {
        matches!(self.kind, DeclKind::Function | DeclKind::Imported | DeclKind::External)
    }
}

/// A conditional statement: its controlling expression and "then" branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditional<N> {
    pub condition: N,
    pub then_branch: N,
}

/// Syntactic shape of an expression, as far as guard matching cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprShape {
    /// A bare reference to a named declaration.
    Reference,
    /// A call expression.
    Call,
    /// Anything else: negation, comparison, logical operators, `let` conditions.
    Other,
}

/// Read-only queries over one translation unit's syntax tree.
pub trait TreeQuery {
    /// A syntax node handle. Cheap to clone.
    type Node: Clone + PartialEq;

    /// Every call expression in the unit, in document order.
    fn all_calls(&self) -> Vec<Self::Node>;

    /// The syntactic parent of `node`, if any.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// If `node` is a function declaration, the declaration it introduces.
    fn function_declaration(&self, node: &Self::Node) -> Option<Declaration>;

    /// If `node` is a conditional statement, its condition and "then" branch.
    fn conditional(&self, node: &Self::Node) -> Option<Conditional<Self::Node>>;

    /// Shape of an expression node.
    fn shape(&self, expr: &Self::Node) -> ExprShape;

    /// The declaration a direct call targets. `None` for indirect or unresolved calls.
    fn direct_callee(&self, call: &Self::Node) -> Option<Declaration>;

    /// The name a call is spelled with, for matching and reporting.
    fn callee_name(&self, call: &Self::Node) -> String;

    /// The declaration a reference expression names.
    fn declaration_of(&self, reference: &Self::Node) -> Option<Declaration>;

    /// The `index`-th argument of a call.
    fn argument(&self, call: &Self::Node, index: usize) -> Option<Self::Node>;

    /// True when `inner` lies within `outer`.
    fn contains(&self, outer: &Self::Node, inner: &Self::Node) -> bool;

    fn location(&self, node: &Self::Node) -> Location;

    /// Walk parent pointers from `node` (exclusive) and return the first
    /// ancestor satisfying `predicate`.
    fn nearest_ancestor<P>(&self, node: &Self::Node, mut predicate: P) -> Option<Self::Node>
    where
        P: FnMut(&Self::Node) -> bool,
    {
        let mut current = self.parent(node);
        while let Some(ancestor) = current {
            if predicate(&ancestor) {
                return Some(ancestor);
            }
            current = self.parent(&ancestor);
        }
        None
    }
}
