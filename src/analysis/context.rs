//! Finding the safety context a call runs in.

use super::query::{Declaration, TreeQuery};

/// Resolves the nearest enclosing function that declares a safety contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextResolver;

impl ContextResolver {
    /// The nearest lexically enclosing function annotated GC-safe or NoGVL-safe.
    ///
    /// Unannotated functions in between are skipped.
    pub fn find_context<T: TreeQuery>(&self, tree: &T, call: &T::Node) -> Option<Declaration> {
        let mut context = None;
        tree.nearest_ancestor(call, |node| match tree.function_declaration(node) {
            Some(decl) if decl.annotations.is_safety_context() => {
                context = Some(decl);
                true
            }
            _ => false,
        })?;
        context
    }
}
