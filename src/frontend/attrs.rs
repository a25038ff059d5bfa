//! Reading safety annotations out of attributes.
//!
//! Accepted spellings, for a token `nogvl_safe`:
//!
//! | Attribute | Notes |
//! |-----------|-------|
//! | `#[nogvl_safe]`, `#[gvl::nogvl_safe]` | last path segment |
//! | `#[annotate("nogvl_safe")]` | generic string tag |
//! | `#[cfg_attr(any(), nogvl_safe)]` | tool-only marker, dropped by rustc |

use ra_ap_syntax::ast::{self, HasAttrs};
use ra_ap_syntax::{AstNode, NodeOrToken, SyntaxKind};
use serde::Deserialize;

use crate::analysis::{AnnotationKind, AnnotationSet};

/// The string tokens that mark each annotation kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotationVocabulary {
    pub gc_safe: String,
    pub nogvl_safe: String,
    pub gvl_guard: String,
}

impl Default for AnnotationVocabulary {
    fn default() -> Self {
        Self {
            gc_safe: "gc_safe".to_string(),
            nogvl_safe: "nogvl_safe".to_string(),
            gvl_guard: "gvl_guard".to_string(),
        }
    }
}

impl AnnotationVocabulary {
    /// Map a raw tag to its annotation kind.
    pub fn kind_of(&self, tag: &str) -> Option<AnnotationKind> {
        if tag == self.gc_safe {
            Some(AnnotationKind::GcSafe)
        } else if tag == self.nogvl_safe {
            Some(AnnotationKind::NoGvlSafe)
        } else if tag == self.gvl_guard {
            Some(AnnotationKind::GvlGuard)
        } else {
            None
        }
    }

    /// Collect the annotations on an item, statement or parameter.
    pub fn annotations_of(&self, node: &impl HasAttrs) -> AnnotationSet {
        node.attrs()
            .flat_map(|attr| attr_tags(&attr))
            .filter_map(|tag| self.kind_of(&tag))
            .collect()
    }
}

/// Candidate tags carried by one attribute.
fn attr_tags(attr: &ast::Attr) -> Vec<String> {
    let Some(name) = attr
        .path()
        .and_then(|path| path.segment())
        .and_then(|segment| segment.name_ref())
        .map(|name_ref| name_ref.text().to_string())
    else {
        return Vec::new();
    };

    match name.as_str() {
        "annotate" => attr
            .token_tree()
            .map(|tt| string_literals(&tt))
            .unwrap_or_default(),
        "cfg_attr" => attr
            .token_tree()
            .map(|tt| idents_after_predicate(&tt))
            .unwrap_or_default(),
        _ => vec![name],
    }
}

fn string_literals(tt: &ast::TokenTree) -> Vec<String> {
    tt.syntax()
        .descendants_with_tokens()
        .filter_map(|element| element.into_token())
        .filter(|token| token.kind() == SyntaxKind::STRING)
        .map(|token| token.text().trim_matches('"').to_string())
        .collect()
}

/// Identifiers in `cfg_attr(pred, attr, ...)` after the predicate.
fn idents_after_predicate(tt: &ast::TokenTree) -> Vec<String> {
    let mut past_predicate = false;
    let mut idents = Vec::new();

    for element in tt.syntax().children_with_tokens() {
        match element {
            NodeOrToken::Token(token) if token.kind() == SyntaxKind::COMMA => {
                past_predicate = true;
            }
            NodeOrToken::Token(token) if past_predicate && token.kind() == SyntaxKind::IDENT => {
                idents.push(token.text().to_string());
            }
            _ => {}
        }
    }

    idents
}
