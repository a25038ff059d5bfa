//! Guard-exempted branches.
//!
//! A call is exempt from the NoGVL rule when it sits in the "then" branch of
//! an `if` whose condition is a bare reference to, or a call of, a
//! declaration annotated as a GVL guard:
//!
//! ```rust,ignore
//! #[nogvl_safe]
//! fn sample() {
//!     if has_gvl() {
//!         rb_raise(...); // exempt: we hold the GVL here
//!     } else {
//!         rb_raise(...); // not exempt
//!     }
//! }
//! ```
//!
//! Only the "then" branch is exempt. A negated guard (`if !has_gvl()`) does
//! not match the pattern at all and exempts nothing.

use super::annotations::AnnotationKind;
use super::query::{Declaration, ExprShape, TreeQuery};

/// Decides whether a call site is covered by a GVL guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardResolver;

impl GuardResolver {
    pub fn is_guard_exempted<T: TreeQuery>(&self, tree: &T, call: &T::Node) -> bool {
        let mut current = tree.parent(call);

        while let Some(node) = current {
            // The body of a nested function runs on its own terms.
            if tree.function_declaration(&node).is_some() {
                return false;
            }

            if let Some(conditional) = tree.conditional(&node) {
                let in_then_branch = tree.contains(&conditional.then_branch, call);
                let is_guard_expr = conditional.condition == *call;

                if in_then_branch && !is_guard_expr {
                    if let Some(guard) = self.guard_subject(tree, &conditional.condition) {
                        let exempt = guard
                            .as_ref()
                            .is_some_and(|decl| decl.annotations.contains(AnnotationKind::GvlGuard));
                        tracing::trace!(
                            guard = guard.as_ref().map(|d| d.name.as_str()).unwrap_or("<unresolved>"),
                            exempt,
                            "nearest guard-shaped conditional"
                        );
                        return exempt;
                    }
                }
            }

            current = tree.parent(&node);
        }

        false
    }

    /// For a reference or call condition, the declaration it names (which may
    /// be unresolved). `None` when the condition has some other shape.
    fn guard_subject<T: TreeQuery>(&self, tree: &T, condition: &T::Node) -> Option<Option<Declaration>> {
        match tree.shape(condition) {
            ExprShape::Reference => Some(tree.declaration_of(condition)),
            ExprShape::Call => Some(tree.direct_callee(condition)),
            ExprShape::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::SyntaxTree;

    /// Exemption of every call named `target` in the source.
    fn exemptions(source: &str, target: &str) -> Vec<bool> {
        let tree = SyntaxTree::parse(source);
        tree.all_calls()
            .iter()
            .filter(|call| tree.callee_name(call) == target)
            .map(|call| GuardResolver.is_guard_exempted(&tree, call))
            .collect()
    }

    #[test]
    fn test_then_branch_of_guard_call_is_exempt() {
        let source = r#"
#[gvl_guard] fn has_gvl() -> bool { true }
#[nogvl_safe]
fn f() {
    if has_gvl() { unsafe_call(); }
}
"#;
        assert_eq!(exemptions(source, "unsafe_call"), vec![true]);
    }

    #[test]
    fn test_else_branch_is_not_exempt() {
        let source = r#"
#[gvl_guard] fn has_gvl() -> bool { true }
fn f() {
    if has_gvl() { a(); } else { unsafe_call(); }
}
"#;
        assert_eq!(exemptions(source, "unsafe_call"), vec![false]);
    }

    #[test]
    fn test_guard_variable_reference() {
        let source = r#"
fn f() {
    #[gvl_guard]
    let gvl = true;
    if gvl { unsafe_call(); }
}
"#;
        assert_eq!(exemptions(source, "unsafe_call"), vec![true]);
    }

    #[test]
    fn test_guard_call_itself_is_not_exempt() {
        let source = r#"
#[gvl_guard] fn has_gvl() -> bool { true }
fn f() { if has_gvl() { a(); } }
"#;
        assert_eq!(exemptions(source, "has_gvl"), vec![false]);
    }

    #[test]
    fn test_unannotated_condition_does_not_exempt() {
        let source = r#"
fn ruby_check() -> bool { true }
fn f() { if ruby_check() { unsafe_call(); } }
"#;
        assert_eq!(exemptions(source, "unsafe_call"), vec![false]);
    }

    #[test]
    fn test_negated_guard_does_not_exempt_either_branch() {
        let source = r#"
#[gvl_guard] fn has_gvl() -> bool { true }
fn f() {
    if !has_gvl() { unsafe_call(); } else { unsafe_call(); }
}
"#;
        assert_eq!(exemptions(source, "unsafe_call"), vec![false, false]);
    }

    #[test]
    fn test_nearest_guard_shaped_conditional_decides() {
        let source = r#"
#[gvl_guard] fn has_gvl() -> bool { true }
fn other() -> bool { true }
fn f() {
    if has_gvl() {
        if other() { unsafe_call(); }
        if !other() { second_call(); }
    }
}
"#;
        assert_eq!(exemptions(source, "unsafe_call"), vec![false]);
        assert_eq!(exemptions(source, "second_call"), vec![true]);
    }

    #[test]
    fn test_else_if_chain_is_not_exempt() {
        let source = r#"
#[gvl_guard] fn has_gvl() -> bool { true }
fn other() -> bool { true }
fn f() {
    if has_gvl() { a(); } else if other() { unsafe_call(); }
}
"#;
        assert_eq!(exemptions(source, "unsafe_call"), vec![false]);
    }

    #[test]
    fn test_guard_does_not_reach_nested_fn() {
        let source = r#"
#[gvl_guard] fn has_gvl() -> bool { true }
fn f() {
    if has_gvl() {
        fn nested() { unsafe_call(); }
    }
}
"#;
        assert_eq!(exemptions(source, "unsafe_call"), vec![false]);
    }

    #[test]
    fn test_parenthesized_condition() {
        let source = r#"
#[gvl_guard] fn has_gvl() -> bool { true }
fn f() { if (has_gvl()) { unsafe_call(); } }
"#;
        assert_eq!(exemptions(source, "unsafe_call"), vec![true]);
    }
}
