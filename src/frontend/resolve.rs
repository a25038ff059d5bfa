//! Syntactic name resolution within one file.

use ra_ap_syntax::ast::{self, HasName};
use ra_ap_syntax::{AstNode, SyntaxNode, TextSize};

use super::index::{method_owner, type_name};
use super::{last_segment, SyntaxTree};
use crate::analysis::{DeclKind, Declaration};

impl SyntaxTree {
    /// Resolve the declaration a path names.
    ///
    /// Every named path resolves to something; paths the file does not
    /// declare become [`DeclKind::External`] declarations at the path.
    pub(crate) fn resolve_path(&self, path: &ast::Path) -> Option<Declaration> {
        let name = last_segment(path)?;

        let resolved = match path.qualifier() {
            None => self
                .resolve_local(&name, path.syntax())
                .or_else(|| self.index.item(&name).cloned())
                .or_else(|| self.index.import(&name).cloned()),
            Some(qualifier) => self
                .qualifier_owner(&qualifier)
                .and_then(|owner| self.index.method(&owner, &name).cloned())
                .or_else(|| {
                    if self.names_local_module(&qualifier) {
                        self.index.item(&name).cloned()
                    } else {
                        None
                    }
                }),
        };

        Some(resolved.unwrap_or_else(|| {
            Declaration::new(name, DeclKind::External, self.locator().locate(path.syntax()))
        }))
    }

    /// Resolve `self.name(..)` to the enclosing `impl` or `trait`'s method.
    ///
    /// Any other receiver has a type this frontend cannot know, so the call
    /// stays unresolved.
    pub(crate) fn resolve_method_call(&self, call: &ast::MethodCallExpr) -> Option<Declaration> {
        let ast::Expr::PathExpr(receiver) = call.receiver()? else {
            return None;
        };
        let path = receiver.path()?;
        if path.qualifier().is_some() || last_segment(&path).as_deref() != Some("self") {
            return None;
        }

        let name = call.name_ref()?.text().to_string();
        let func = call.syntax().ancestors().find_map(ast::Fn::cast)?;
        let owner = method_owner(func.syntax())?;
        self.index.method(&owner, &name).cloned()
    }

    /// True if a qualifier leads into this file's own items: `crate`,
    /// `self`, `super`, or an inline module.
    fn names_local_module(&self, qualifier: &ast::Path) -> bool {
        match last_segment(qualifier) {
            Some(name) => matches!(name.as_str(), "crate" | "self" | "super") || self.index.is_module(&name),
            None => false,
        }
    }

    /// The type or trait a qualifier names, with `Self` resolved to the
    /// enclosing impl's type.
    fn qualifier_owner(&self, qualifier: &ast::Path) -> Option<String> {
        let name = qualifier.segment()?.name_ref()?.text().to_string();
        if name == "Self" {
            return qualifier
                .syntax()
                .ancestors()
                .find_map(ast::Impl::cast)
                .and_then(|imp| imp.self_ty())
                .map(|ty| type_name(&ty));
        }
        Some(name)
    }

    /// Find the latest local binding of `name` visible at `at`.
    ///
    /// Looks at preceding `let` statements in enclosing blocks, patterns
    /// bound by `if let`/`while let`/`match`/`for`, and closure and function
    /// parameters. Stops at the enclosing `fn`.
    fn resolve_local(&self, name: &str, at: &SyntaxNode) -> Option<Declaration> {
        let use_offset = at.text_range().start();

        for ancestor in at.ancestors() {
            if let Some(stmt_list) = ast::StmtList::cast(ancestor.clone()) {
                if let Some(decl) = self.preceding_let(&stmt_list, name, use_offset) {
                    return Some(decl);
                }
            } else if let Some(arm) = ast::MatchArm::cast(ancestor.clone()) {
                if let Some(decl) = arm.pat().and_then(|pat| self.pattern_binding(&pat, name)) {
                    return Some(decl);
                }
            } else if let Some(for_expr) = ast::ForExpr::cast(ancestor.clone()) {
                if let Some(decl) = for_expr.pat().and_then(|pat| self.pattern_binding(&pat, name)) {
                    return Some(decl);
                }
            } else if let Some(if_expr) = ast::IfExpr::cast(ancestor.clone()) {
                if let Some(decl) = if_expr
                    .condition()
                    .and_then(|cond| self.let_condition_binding(cond.syntax(), name))
                {
                    return Some(decl);
                }
            } else if let Some(while_expr) = ast::WhileExpr::cast(ancestor.clone()) {
                if let Some(decl) = while_expr
                    .condition()
                    .and_then(|cond| self.let_condition_binding(cond.syntax(), name))
                {
                    return Some(decl);
                }
            } else if let Some(closure) = ast::ClosureExpr::cast(ancestor.clone()) {
                if let Some(params) = closure.param_list() {
                    if let Some(decl) = self.param_binding(&params, name) {
                        return Some(decl);
                    }
                }
            } else if let Some(func) = ast::Fn::cast(ancestor) {
                return func
                    .param_list()
                    .and_then(|params| self.param_binding(&params, name));
            }
        }

        None
    }

    fn preceding_let(&self, stmt_list: &ast::StmtList, name: &str, before: TextSize) -> Option<Declaration> {
        stmt_list
            .statements()
            .take_while(|stmt| stmt.syntax().text_range().end() <= before)
            .filter_map(|stmt| match stmt {
                ast::Stmt::LetStmt(let_stmt) => Some(let_stmt),
                _ => None,
            })
            .filter_map(|let_stmt| {
                let pat = let_stmt.pat()?;
                let mut decl = self.pattern_binding(&pat, name)?;
                decl.annotations = self.vocabulary.annotations_of(&let_stmt);
                Some(decl)
            })
            .last()
    }

    fn param_binding(&self, params: &ast::ParamList, name: &str) -> Option<Declaration> {
        params.params().find_map(|param| {
            let pat = param.pat()?;
            let mut decl = self.pattern_binding(&pat, name)?;
            decl.annotations = self.vocabulary.annotations_of(&param);
            Some(decl)
        })
    }

    fn let_condition_binding(&self, condition: &SyntaxNode, name: &str) -> Option<Declaration> {
        condition
            .descendants()
            .filter_map(ast::LetExpr::cast)
            .filter_map(|let_expr| let_expr.pat())
            .find_map(|pat| self.pattern_binding(&pat, name))
    }

    /// A local declaration if `pat` binds `name` anywhere inside it.
    fn pattern_binding(&self, pat: &ast::Pat, name: &str) -> Option<Declaration> {
        pat.syntax()
            .descendants()
            .filter_map(ast::IdentPat::cast)
            .filter_map(|ident| ident.name())
            .find(|binding| binding.text() == name)
            .map(|binding| {
                Declaration::new(name, DeclKind::Local, self.locator().locate(binding.syntax()))
            })
    }
}

#[cfg(test)]
mod tests {
    use ra_ap_syntax::AstNode;

    use crate::analysis::{AnnotationKind, DeclKind, TreeQuery};
    use crate::frontend::SyntaxTree;

    /// Resolve every path expression spelled `name`, in document order.
    fn resolve_all(source: &str, name: &str) -> Vec<Option<(DeclKind, u32)>> {
        let tree = SyntaxTree::parse(source);
        tree.all_calls()
            .iter()
            .filter_map(|call| tree.argument(call, 0))
            .filter(|arg| arg.text() == name)
            .map(|arg| tree.declaration_of(&arg).map(|d| (d.kind, d.location.line)))
            .collect()
    }

    #[test]
    fn test_local_shadows_item() {
        let source = r#"
fn value() {}
fn main() {
    use_it(value);
    let value = 1;
    use_it(value);
}
"#;
        assert_eq!(
            resolve_all(source, "value"),
            vec![Some((DeclKind::Function, 1)), Some((DeclKind::Local, 4))]
        );
    }

    #[test]
    fn test_latest_let_wins() {
        let source = r#"
fn main() {
    let x = 1;
    let x = 2;
    use_it(x);
}
"#;
        assert_eq!(resolve_all(source, "x"), vec![Some((DeclKind::Local, 3))]);
    }

    #[test]
    fn test_let_is_not_visible_in_own_initializer() {
        let source = r#"
fn main() {
    let f = use_it(f);
}
"#;
        assert_eq!(resolve_all(source, "f"), vec![Some((DeclKind::External, 2))]);
    }

    #[test]
    fn test_parameters_and_patterns() {
        let source = r#"
fn main(a: i32) {
    use_it(a);
    if let Some(b) = opt { use_it(b); }
    for c in items { use_it(c); }
    match m { (d, _) => use_it(d) }
    let g = |e| use_it(e);
}
"#;
        assert_eq!(resolve_all(source, "a"), vec![Some((DeclKind::Local, 1))]);
        assert_eq!(resolve_all(source, "b"), vec![Some((DeclKind::Local, 3))]);
        assert_eq!(resolve_all(source, "c"), vec![Some((DeclKind::Local, 4))]);
        assert_eq!(resolve_all(source, "d"), vec![Some((DeclKind::Local, 5))]);
        assert_eq!(resolve_all(source, "e"), vec![Some((DeclKind::Local, 6))]);
    }

    #[test]
    fn test_outer_locals_invisible_in_nested_fn() {
        let source = r#"
fn main() {
    let x = 1;
    fn nested() { use_it(x); }
}
"#;
        assert_eq!(resolve_all(source, "x"), vec![Some((DeclKind::External, 3))]);
    }

    #[test]
    fn test_annotated_let_binding() {
        let source = r#"
fn main() {
    #[gvl_guard]
    let gvl = true;
    if gvl {}
}
"#;
        let tree = SyntaxTree::parse(source);
        let conditional = tree
            .file
            .syntax()
            .descendants()
            .find_map(|node| tree.conditional(&node))
            .expect("if expression");
        let decl = tree.declaration_of(&conditional.condition).expect("resolves");
        assert_eq!(decl.kind, DeclKind::Local);
        assert!(decl.annotations.contains(AnnotationKind::GvlGuard));
    }

    #[test]
    fn test_qualified_reference_outside_file_is_external() {
        let source = r#"
#[nogvl_safe] fn sampler() {}
mod native { pub fn worker() {} }
fn main() {
    use_it(ext::sampler);
    use_it(super::sampler);
    use_it(native::worker);
}
"#;
        assert_eq!(
            resolve_all(source, "ext::sampler"),
            vec![Some((DeclKind::External, 4))]
        );
        assert_eq!(
            resolve_all(source, "super::sampler"),
            vec![Some((DeclKind::Function, 1))]
        );
        assert_eq!(
            resolve_all(source, "native::worker"),
            vec![Some((DeclKind::Function, 2))]
        );
    }

    #[test]
    fn test_self_qualified_method() {
        let source = r#"
struct Sampler;
impl Sampler {
    #[gvl_guard]
    fn holds_gvl() -> bool { true }
    fn sample() { use_it(Self::holds_gvl); }
}
"#;
        let tree = SyntaxTree::parse(source);
        let call = &tree.all_calls()[0];
        let arg = tree.argument(call, 0).unwrap();
        let decl = tree.declaration_of(&arg).unwrap();
        assert_eq!(decl.kind, DeclKind::Function);
        assert!(decl.annotations.contains(AnnotationKind::GvlGuard));
    }
}
