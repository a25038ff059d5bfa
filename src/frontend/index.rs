//! Declaration index - maps names in one source file to their declarations.
//!
//! Walks the syntax tree once to collect:
//! - `fn` items at any depth, including foreign functions in `extern` blocks
//! - methods in `impl` and `trait` blocks, keyed by owner and name
//! - `static` and `const` items
//! - names brought in by `use`
//! - struct and enum-variant names, whose `Name(..)` form is a constructor
//! - inline `mod` blocks, whose items a qualified path may name

use ra_ap_syntax::ast::{self, HasName};
use ra_ap_syntax::{AstNode, SourceFile, SyntaxNode};
use std::collections::{HashMap, HashSet};

use super::attrs::AnnotationVocabulary;
use super::Locator;
use crate::analysis::{DeclKind, Declaration};

/// Index of the declarations of one translation unit.
#[derive(Debug, Default)]
pub struct DeclarationIndex {
    /// Free functions, foreign items, statics and consts: name → declaration.
    /// The first declaration in document order wins.
    items: HashMap<String, Declaration>,
    /// Methods: (owner type or trait, method name) → declaration.
    methods: HashMap<(String, String), Declaration>,
    /// Names imported with `use`.
    imports: HashMap<String, Declaration>,
    /// Struct and enum-variant names.
    constructors: HashSet<String>,
    /// Names of `mod` items with a body in this file.
    modules: HashSet<String>,
}

impl DeclarationIndex {
    /// Build an index from a parsed source file.
    pub fn build(file: &SourceFile, vocabulary: &AnnotationVocabulary, locator: &Locator<'_>) -> Self {
        let mut index = DeclarationIndex::default();

        for node in file.syntax().descendants() {
            if let Some(func) = ast::Fn::cast(node.clone()) {
                index.record_fn(&func, vocabulary, locator);
            } else if let Some(item) = ast::Static::cast(node.clone()) {
                index.record_variable(&item, vocabulary, locator);
            } else if let Some(item) = ast::Const::cast(node.clone()) {
                index.record_variable(&item, vocabulary, locator);
            } else if let Some(use_item) = ast::Use::cast(node.clone()) {
                if let Some(tree) = use_item.use_tree() {
                    index.record_use_tree(&tree, locator);
                }
            } else if let Some(item) = ast::Struct::cast(node.clone()) {
                index.record_constructor(&item);
            } else if let Some(variant) = ast::Variant::cast(node.clone()) {
                index.record_constructor(&variant);
            } else if let Some(module) = ast::Module::cast(node) {
                if module.item_list().is_some() {
                    if let Some(name) = module.name() {
                        index.modules.insert(name.text().to_string());
                    }
                }
            }
        }

        tracing::trace!(
            items = index.items.len(),
            methods = index.methods.len(),
            imports = index.imports.len(),
            "declaration index built"
        );
        index
    }

    /// Look up a free item by name.
    pub fn item(&self, name: &str) -> Option<&Declaration> {
        self.items.get(name)
    }

    /// Look up a method by owner and name.
    pub fn method(&self, owner: &str, name: &str) -> Option<&Declaration> {
        self.methods.get(&(owner.to_string(), name.to_string()))
    }

    /// Look up a name imported by `use`.
    pub fn import(&self, name: &str) -> Option<&Declaration> {
        self.imports.get(name)
    }

    /// True if a struct or enum variant of this name is declared.
    pub fn is_constructor(&self, name: &str) -> bool {
        self.constructors.contains(name)
    }

    /// True if an inline `mod` of this name is declared.
    pub fn is_module(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    fn record_fn(&mut self, func: &ast::Fn, vocabulary: &AnnotationVocabulary, locator: &Locator<'_>) {
        let Some(decl) = fn_declaration(func, vocabulary, locator) else {
            return;
        };

        match method_owner(func.syntax()) {
            Some(owner) => {
                self.methods.entry((owner, decl.name.clone())).or_insert(decl);
            }
            None => {
                self.items.entry(decl.name.clone()).or_insert(decl);
            }
        }
    }

    fn record_variable<N: HasName + ast::HasAttrs>(
        &mut self,
        item: &N,
        vocabulary: &AnnotationVocabulary,
        locator: &Locator<'_>,
    ) {
        let Some(name) = item.name() else { return };
        let decl = Declaration::new(name.text().to_string(), DeclKind::Variable, locator.locate(name.syntax()))
            .with_annotations(vocabulary.annotations_of(item));
        self.items.entry(decl.name.clone()).or_insert(decl);
    }

    fn record_constructor<N: HasName>(&mut self, item: &N) {
        if let Some(name) = item.name() {
            self.constructors.insert(name.text().to_string());
        }
    }

    fn record_use_tree(&mut self, tree: &ast::UseTree, locator: &Locator<'_>) {
        if let Some(list) = tree.use_tree_list() {
            for child in list.use_trees() {
                self.record_use_tree(&child, locator);
            }
            return;
        }
        if tree.star_token().is_some() {
            return;
        }

        let renamed = tree.rename().and_then(|rename| rename.name());
        let (name, node) = match renamed {
            Some(name) => (name.text().to_string(), name.syntax().clone()),
            None => {
                let Some(name_ref) = tree
                    .path()
                    .and_then(|path| path.segment())
                    .and_then(|segment| segment.name_ref())
                else {
                    return;
                };
                (name_ref.text().to_string(), name_ref.syntax().clone())
            }
        };

        if name == "self" || name == "_" {
            return;
        }

        let decl = Declaration::new(name.clone(), DeclKind::Imported, locator.locate(&node));
        self.imports.entry(name).or_insert(decl);
    }
}

/// The declaration introduced by a `fn` item, located at its name.
pub fn fn_declaration(
    func: &ast::Fn,
    vocabulary: &AnnotationVocabulary,
    locator: &Locator<'_>,
) -> Option<Declaration> {
    let name = func.name()?;
    Some(
        Declaration::new(name.text().to_string(), DeclKind::Function, locator.locate(name.syntax()))
            .with_annotations(vocabulary.annotations_of(func)),
    )
}

/// For a `fn` inside an `impl` or `trait`, the owner's name.
pub fn method_owner(fn_node: &SyntaxNode) -> Option<String> {
    let list = fn_node.parent().and_then(ast::AssocItemList::cast)?;
    let owner = list.syntax().parent()?;

    if let Some(imp) = ast::Impl::cast(owner.clone()) {
        return imp.self_ty().map(|ty| type_name(&ty));
    }
    ast::Trait::cast(owner)
        .and_then(|tr| tr.name())
        .map(|name| name.text().to_string())
}

/// The last path segment of a type, without generic arguments.
pub fn type_name(ty: &ast::Type) -> String {
    if let ast::Type::PathType(path_type) = ty {
        if let Some(name_ref) = path_type
            .path()
            .and_then(|path| path.segment())
            .and_then(|segment| segment.name_ref())
        {
            return name_ref.text().to_string();
        }
    }
    ty.syntax().text().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnnotationKind;
    use crate::util::LineIndex;

    fn build(source: &str) -> DeclarationIndex {
        let file = SourceFile::parse(source, ra_ap_syntax::Edition::Edition2021).tree();
        let line_index = LineIndex::new(source);
        let locator = Locator::new(source, &line_index);
        DeclarationIndex::build(&file, &AnnotationVocabulary::default(), &locator)
    }

    #[test]
    fn test_free_and_foreign_functions() {
        let index = build(
            r#"
fn foo() {}
extern "C" {
    #[nogvl_safe]
    fn ruby_native_thread_p() -> i32;
    static rb_cObject: usize;
}
"#,
        );
        assert_eq!(index.item("foo").map(|d| d.kind), Some(DeclKind::Function));
        let native = index.item("ruby_native_thread_p").expect("foreign fn indexed");
        assert!(native.annotations.contains(AnnotationKind::NoGvlSafe));
        assert_eq!(native.location.line, 4);
        assert_eq!(index.item("rb_cObject").map(|d| d.kind), Some(DeclKind::Variable));
        assert!(index.item("bar").is_none());
    }

    #[test]
    fn test_impl_and_trait_methods() {
        let index = build(
            r#"
struct Sampler;
impl Sampler {
    #[gvl_guard]
    fn holds_gvl(&self) -> bool { true }
}
impl<T> Wrapper<T> { fn holds_gvl(&self) -> bool { false } }
trait Sample { fn sample(&self); }
"#,
        );
        let method = index.method("Sampler", "holds_gvl").expect("method indexed");
        assert!(method.annotations.contains(AnnotationKind::GvlGuard));
        assert!(index.method("Wrapper", "holds_gvl").is_some());
        assert!(index.method("Sample", "sample").is_some());
        assert!(index.item("holds_gvl").is_none());
    }

    #[test]
    fn test_use_imports() {
        let index = build(
            r#"
use rb_sys::{rb_thread_current, rb_raise as raise, ruby_xmalloc};
use libc::*;
use std::io::{self};
"#,
        );
        assert_eq!(index.import("rb_thread_current").map(|d| d.kind), Some(DeclKind::Imported));
        assert!(index.import("raise").is_some());
        assert!(index.import("rb_raise").is_none());
        assert!(index.import("ruby_xmalloc").is_some());
        assert!(index.import("self").is_none());
    }

    #[test]
    fn test_constructors_and_inline_modules() {
        let index = build(
            r#"
struct Wrapper(u32);
enum State { Running(u32), Stopped }
mod ffi { pub fn rb_gc() {} }
mod outlined;
"#,
        );
        assert!(index.is_constructor("Wrapper"));
        assert!(index.is_constructor("Running"));
        assert!(index.is_constructor("Stopped"));
        assert!(!index.is_constructor("rb_gc"));
        assert!(index.is_module("ffi"));
        assert!(!index.is_module("outlined"));
        assert_eq!(index.item("rb_gc").map(|d| d.kind), Some(DeclKind::Function));
    }

    #[test]
    fn test_first_declaration_wins() {
        let index = build(
            r#"
#[nogvl_safe] fn dup() {}
mod inner { fn dup() {} }
"#,
        );
        let decl = index.item("dup").unwrap();
        assert!(decl.annotations.contains(AnnotationKind::NoGvlSafe));
        assert_eq!(decl.location.line, 1);
    }
}
