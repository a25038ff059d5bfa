//! Rust source frontend for the rule engine.
//!
//! [`SyntaxTree`] parses one file with `ra_ap_syntax` and answers the
//! engine's [`TreeQuery`] questions over it. Resolution is purely syntactic
//! and local to the file:
//!
//! - a single-segment path resolves to the latest preceding local binding,
//!   then to a file-level item, then to a `use` import
//! - `Type::method` and `Self::method` resolve to indexed methods
//! - `crate::f`, `self::f`, `super::f` and `module::f` for an inline module
//!   resolve to file-level items
//! - anything else named by a path is an [`DeclKind::External`] declaration
//! - `self.method()` inside an `impl` or `trait` resolves to that owner's
//!   method; every other method call has an unknown receiver type
//! - callees that are expressions (locals, fields, closures) are indirect
//!
//! Calls of `Some`, `Ok`, `Err`, `Self` and of structs and enum variants
//! declared in the file are constructors, not calls. An upper-case name
//! the file does not declare as a type stays a call.

mod attrs;
mod index;
mod resolve;

pub use attrs::AnnotationVocabulary;

use index::DeclarationIndex;

use ra_ap_syntax::ast::{self, HasArgList};
use ra_ap_syntax::{AstNode, SourceFile, SyntaxNode};

use crate::analysis::{Conditional, DeclKind, Declaration, ExprShape, Location, TreeQuery};
use crate::util::LineIndex;

/// Converts syntax node ranges into [`Location`]s.
pub struct Locator<'a> {
    source: &'a str,
    line_index: &'a LineIndex,
}

impl<'a> Locator<'a> {
    pub fn new(source: &'a str, line_index: &'a LineIndex) -> Self {
        Self { source, line_index }
    }

    pub fn locate(&self, node: &SyntaxNode) -> Location {
        let range = node.text_range();
        let offset = u32::from(range.start());
        let position = self.line_index.line_col(self.source, offset);
        Location {
            offset,
            len: u32::from(range.len()),
            line: position.line,
            column: position.column,
        }
    }
}

/// One parsed translation unit.
pub struct SyntaxTree {
    source: String,
    file: SourceFile,
    line_index: LineIndex,
    vocabulary: AnnotationVocabulary,
    index: DeclarationIndex,
    parse_errors: Vec<String>,
}

impl SyntaxTree {
    /// Parse with the default annotation vocabulary.
    pub fn parse(source: &str) -> Self {
        Self::parse_with(source, &AnnotationVocabulary::default())
    }

    pub fn parse_with(source: &str, vocabulary: &AnnotationVocabulary) -> Self {
        let parse = SourceFile::parse(source, ra_ap_syntax::Edition::Edition2021);
        let parse_errors: Vec<String> = parse.errors().iter().map(|e| e.to_string()).collect();
        for error in &parse_errors {
            tracing::warn!("Parse error: {}", error);
        }

        let file = parse.tree();
        let line_index = LineIndex::new(source);
        let index = {
            let locator = Locator::new(source, &line_index);
            DeclarationIndex::build(&file, vocabulary, &locator)
        };

        Self {
            source: source.to_string(),
            file,
            line_index,
            vocabulary: vocabulary.clone(),
            index,
            parse_errors,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parse_errors(&self) -> &[String] {
        &self.parse_errors
    }

    pub(crate) fn locator(&self) -> Locator<'_> {
        Locator::new(&self.source, &self.line_index)
    }

    /// True if `path(..)` builds a value rather than calling a function.
    fn is_constructor(&self, path: &ast::Path) -> bool {
        let Some(name) = last_segment(path) else {
            return false;
        };
        if BUILTIN_CONSTRUCTORS.contains(&name.as_str()) {
            return true;
        }
        let names_function = self
            .index
            .item(&name)
            .is_some_and(|decl| decl.kind == DeclKind::Function)
            || self.index.import(&name).is_some();
        self.index.is_constructor(&name) && !names_function
    }
}

/// What a call expression calls.
enum Callee {
    /// `path(...)`
    Path(ast::Path),
    /// `receiver.name(...)`
    Method(ast::MethodCallExpr),
    /// `(expr)(...)` for any other callee expression
    Indirect(ast::Expr),
}

fn callee_of(node: &SyntaxNode) -> Option<Callee> {
    if let Some(call) = ast::CallExpr::cast(node.clone()) {
        return match call.expr()? {
            ast::Expr::PathExpr(path_expr) => path_expr.path().map(Callee::Path),
            other => Some(Callee::Indirect(other)),
        };
    }
    ast::MethodCallExpr::cast(node.clone()).map(Callee::Method)
}

/// The final segment's name of a path.
fn last_segment(path: &ast::Path) -> Option<String> {
    let name_ref = path.segment()?.name_ref()?;
    Some(name_ref.text().to_string())
}

/// Constructors the prelude and the language provide.
const BUILTIN_CONSTRUCTORS: &[&str] = &["Some", "Ok", "Err", "Self"];

/// Strip parentheses, `Some(..)` wrappers and `as` casts from an argument.
fn peel_argument(mut expr: ast::Expr) -> ast::Expr {
    loop {
        let inner = match &expr {
            ast::Expr::ParenExpr(paren) => paren.expr(),
            ast::Expr::CastExpr(cast) => cast.expr(),
            ast::Expr::CallExpr(call) => match call.expr() {
                Some(ast::Expr::PathExpr(path_expr))
                    if path_expr.path().and_then(|p| last_segment(&p)).as_deref() == Some("Some") =>
                {
                    call.arg_list().and_then(|args| {
                        let mut args = args.args();
                        let first = args.next();
                        first.filter(|_| args.next().is_none())
                    })
                }
                _ => None,
            },
            _ => None,
        };
        match inner {
            Some(inner) => expr = inner,
            None => return expr,
        }
    }
}

fn peel_parens(mut expr: ast::Expr) -> ast::Expr {
    while let ast::Expr::ParenExpr(paren) = &expr {
        match paren.expr() {
            Some(inner) => expr = inner,
            None => break,
        }
    }
    expr
}

impl TreeQuery for SyntaxTree {
    type Node = SyntaxNode;

    fn all_calls(&self) -> Vec<SyntaxNode> {
        self.file
            .syntax()
            .descendants()
            .filter(|node| match callee_of(node) {
                Some(Callee::Path(path)) => !self.is_constructor(&path),
                Some(_) => true,
                None => false,
            })
            .collect()
    }

    fn parent(&self, node: &SyntaxNode) -> Option<SyntaxNode> {
        node.parent()
    }

    fn function_declaration(&self, node: &SyntaxNode) -> Option<Declaration> {
        let func = ast::Fn::cast(node.clone())?;
        index::fn_declaration(&func, &self.vocabulary, &self.locator())
    }

    fn conditional(&self, node: &SyntaxNode) -> Option<Conditional<SyntaxNode>> {
        let if_expr = ast::IfExpr::cast(node.clone())?;
        let condition = peel_parens(if_expr.condition()?);
        let then_branch = if_expr.then_branch()?;
        Some(Conditional {
            condition: condition.syntax().clone(),
            then_branch: then_branch.syntax().clone(),
        })
    }

    fn shape(&self, expr: &SyntaxNode) -> ExprShape {
        match ast::Expr::cast(expr.clone()) {
            Some(ast::Expr::PathExpr(_)) => ExprShape::Reference,
            Some(ast::Expr::CallExpr(_)) | Some(ast::Expr::MethodCallExpr(_)) => ExprShape::Call,
            _ => ExprShape::Other,
        }
    }

    fn direct_callee(&self, call: &SyntaxNode) -> Option<Declaration> {
        match callee_of(call)? {
            Callee::Path(path) => self
                .resolve_path(&path)
                .filter(Declaration::is_callable),
            Callee::Method(method) => self.resolve_method_call(&method),
            Callee::Indirect(_) => None,
        }
    }

    fn callee_name(&self, call: &SyntaxNode) -> String {
        match callee_of(call) {
            Some(Callee::Path(path)) => {
                last_segment(&path).unwrap_or_else(|| path.syntax().text().to_string())
            }
            Some(Callee::Method(method)) => method
                .name_ref()
                .map(|name| name.text().to_string())
                .unwrap_or_default(),
            Some(Callee::Indirect(expr)) => expr.syntax().text().to_string(),
            None => String::new(),
        }
    }

    fn declaration_of(&self, reference: &SyntaxNode) -> Option<Declaration> {
        let path_expr = ast::PathExpr::cast(reference.clone())?;
        self.resolve_path(&path_expr.path()?)
    }

    fn argument(&self, call: &SyntaxNode, index: usize) -> Option<SyntaxNode> {
        let args = match ast::Expr::cast(call.clone())? {
            ast::Expr::CallExpr(call) => call.arg_list()?,
            ast::Expr::MethodCallExpr(call) => call.arg_list()?,
            _ => return None,
        };
        let arg = args.args().nth(index)?;
        Some(peel_argument(arg).syntax().clone())
    }

    fn contains(&self, outer: &SyntaxNode, inner: &SyntaxNode) -> bool {
        inner.ancestors().any(|ancestor| ancestor == *outer)
    }

    fn location(&self, node: &SyntaxNode) -> Location {
        let locator = self.locator();
        match ast::MethodCallExpr::cast(node.clone()).and_then(|m| m.name_ref()) {
            Some(name) => locator.locate(name.syntax()),
            None => locator.locate(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ViolationKind;

    fn call_names(source: &str) -> Vec<String> {
        let tree = SyntaxTree::parse(source);
        tree.all_calls().iter().map(|c| tree.callee_name(c)).collect()
    }

    fn callee_kinds(source: &str) -> Vec<(String, Option<DeclKind>)> {
        let tree = SyntaxTree::parse(source);
        tree.all_calls()
            .iter()
            .map(|c| (tree.callee_name(c), tree.direct_callee(c).map(|d| d.kind)))
            .collect()
    }

    #[test]
    fn test_calls_in_document_order() {
        let names = call_names(
            r#"
fn main() {
    first(second(), x.third());
    if cond() { inner(); }
}
"#,
        );
        assert_eq!(names, vec!["first", "second", "third", "cond", "inner"]);
    }

    #[test]
    fn test_constructors_are_not_calls() {
        let names = call_names(
            r#"
struct Wrapper(u32);
enum State { Running(u32) }
impl Wrapper { fn new() -> Self { Self(0) } }
fn f() {
    let _ = Some(Wrapper(g()));
    let _ = State::Running(1);
    Ok::<(), ()>(());
}
"#,
        );
        assert_eq!(names, vec!["g"]);
    }

    #[test]
    fn test_upper_case_functions_are_calls() {
        let kinds = callee_kinds(
            r#"
extern "C" { fn RSTRING_PTR(v: usize) -> *const u8; }
use rb_sys::NUM2INT;
fn main(v: usize) {
    RSTRING_PTR(v);
    NUM2INT(v);
    RARRAY_LEN(v);
    Unknown(v);
}
"#,
        );
        assert_eq!(
            kinds,
            vec![
                ("RSTRING_PTR".to_string(), Some(DeclKind::Function)),
                ("NUM2INT".to_string(), Some(DeclKind::Imported)),
                ("RARRAY_LEN".to_string(), Some(DeclKind::External)),
                ("Unknown".to_string(), Some(DeclKind::External)),
            ]
        );
    }

    #[test]
    fn test_callee_resolution_kinds() {
        let kinds = callee_kinds(
            r#"
use rb_sys::rb_raise;
extern "C" { fn ruby_xmalloc(n: usize) -> *mut u8; }
struct S;
impl S { fn new() -> S { S } fn go(&self) { self.new(); } }
fn main(cb: fn()) {
    ruby_xmalloc(1);
    rb_raise();
    rb_sys::rb_gc();
    S::new();
    cb();
    (table.handler)();
}
"#,
        );
        assert_eq!(
            kinds,
            vec![
                ("new".to_string(), Some(DeclKind::Function)),
                ("ruby_xmalloc".to_string(), Some(DeclKind::Function)),
                ("rb_raise".to_string(), Some(DeclKind::Imported)),
                ("rb_gc".to_string(), Some(DeclKind::External)),
                ("new".to_string(), Some(DeclKind::Function)),
                ("cb".to_string(), None),
                ("(table.handler)".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_qualified_path_to_other_crate_is_external() {
        let kinds = callee_kinds(
            r#"
#[nogvl_safe] fn write() {}
mod ffi { #[nogvl_safe] pub fn flush() {} }
fn main() {
    libc::write();
    crate::write();
    self::write();
    ffi::flush();
    S::write();
}
"#,
        );
        assert_eq!(
            kinds,
            vec![
                ("write".to_string(), Some(DeclKind::External)),
                ("write".to_string(), Some(DeclKind::Function)),
                ("write".to_string(), Some(DeclKind::Function)),
                ("flush".to_string(), Some(DeclKind::Function)),
                ("write".to_string(), Some(DeclKind::External)),
            ]
        );
    }

    #[test]
    fn test_method_on_unknown_receiver_is_indirect() {
        let source = r#"
struct Buf;
impl Buf {
    #[nogvl_safe]
    fn push(&mut self, _: u8) {}
    fn fill(&mut self) { self.push(1); }
}
fn main(v: &mut Vec<u8>, b: &mut Buf) { v.push(1); b.push(1); }
"#;
        let tree = SyntaxTree::parse(source);
        let resolved: Vec<_> = tree
            .all_calls()
            .iter()
            .map(|c| tree.direct_callee(c).map(|d| d.location.line))
            .collect();
        assert_eq!(resolved, vec![Some(4), None, None]);
    }

    #[test]
    fn test_upper_case_and_qualified_callees_fail_closed() {
        let source = r#"
extern "C" { fn RSTRING_PTR(v: usize) -> *const u8; }
#[nogvl_safe] fn write() {}
struct Buf;
impl Buf { #[nogvl_safe] fn push(&mut self, _: u8) {} }
#[nogvl_safe]
fn sample(v: usize, out: &mut Vec<u8>) {
    RSTRING_PTR(v);
    libc::write();
    out.push(1);
}
"#;
        let violations = crate::analysis::analyze(&SyntaxTree::parse(source));
        let names: Vec<_> = violations
            .iter()
            .map(|v| (v.kind, v.callee_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                (ViolationKind::NoGvlSafety, "RSTRING_PTR"),
                (ViolationKind::NoGvlSafety, "write"),
                (ViolationKind::NoGvlSafety, "push"),
            ]
        );
    }

    #[test]
    fn test_argument_peeling() {
        let tree = SyntaxTree::parse(
            "fn main() { call(Some(work as extern \"C\" fn()), (other)); }",
        );
        let call = &tree.all_calls()[0];
        let first = tree.argument(call, 0).unwrap();
        assert_eq!(first.text().to_string(), "work");
        let second = tree.argument(call, 1).unwrap();
        assert_eq!(second.text().to_string(), "other");
        assert!(tree.argument(call, 2).is_none());
    }

    #[test]
    fn test_method_call_location_is_method_name() {
        let tree = SyntaxTree::parse("fn main() {\n    value.compute();\n}");
        let call = &tree.all_calls()[0];
        let location = tree.location(call);
        assert_eq!((location.line, location.column), (1, 10));
    }

    #[test]
    fn test_parse_errors_are_recovered() {
        let tree = SyntaxTree::parse("fn broken( { call(); }");
        assert!(!tree.parse_errors().is_empty());
    }
}
