//! Safety annotations and the classification of declarations into profiles.

use serde::{Deserialize, Serialize};

use super::query::Declaration;
use super::whitelist::NameWhitelist;

/// A safety annotation a declaration may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Safe to run while the garbage collector has control.
    GcSafe,
    /// Safe to run without holding the global VM lock.
    NoGvlSafe,
    /// True value certifies the global VM lock is currently held.
    GvlGuard,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 3] = [
        AnnotationKind::GcSafe,
        AnnotationKind::NoGvlSafe,
        AnnotationKind::GvlGuard,
    ];

    fn bit(self) -> u8 {
        match self {
            AnnotationKind::GcSafe => 0b001,
            AnnotationKind::NoGvlSafe => 0b010,
            AnnotationKind::GvlGuard => 0b100,
        }
    }
}

/// The set of annotations attached to one declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "Vec<AnnotationKind>")]
pub struct AnnotationSet {
    bits: u8,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: AnnotationKind) {
        self.bits |= kind.bit();
    }

    pub fn with(mut self, kind: AnnotationKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn contains(&self, kind: AnnotationKind) -> bool {
        self.bits & kind.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// True if the set names a safety context (GC-safe or NoGVL-safe).
    pub fn is_safety_context(&self) -> bool {
        self.contains(AnnotationKind::GcSafe) || self.contains(AnnotationKind::NoGvlSafe)
    }

    pub fn iter(&self) -> impl Iterator<Item = AnnotationKind> + '_ {
        AnnotationKind::ALL.into_iter().filter(|kind| self.contains(*kind))
    }
}

impl FromIterator<AnnotationKind> for AnnotationSet {
    fn from_iter<I: IntoIterator<Item = AnnotationKind>>(iter: I) -> Self {
        let mut set = AnnotationSet::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl From<AnnotationSet> for Vec<AnnotationKind> {
    fn from(set: AnnotationSet) -> Self {
        set.iter().collect()
    }
}

/// Derived safety properties of a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SafetyProfile {
    pub gc_safe: bool,
    pub nogvl_safe: bool,
    pub is_guard: bool,
}

/// Classifies declarations into [`SafetyProfile`]s.
///
/// Whitelist membership only ever grants NoGVL safety; GC safety always
/// requires an explicit annotation.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationModel<'w> {
    whitelist: &'w NameWhitelist,
}

impl<'w> AnnotationModel<'w> {
    pub fn new(whitelist: &'w NameWhitelist) -> Self {
        Self { whitelist }
    }

    /// Classify a declaration. An absent declaration is unsafe in every respect.
    pub fn classify(&self, decl: Option<&Declaration>) -> SafetyProfile {
        let Some(decl) = decl else {
            return SafetyProfile::default();
        };

        let annotations = &decl.annotations;
        let is_guard = annotations.contains(AnnotationKind::GvlGuard);

        SafetyProfile {
            gc_safe: annotations.contains(AnnotationKind::GcSafe),
            nogvl_safe: annotations.contains(AnnotationKind::NoGvlSafe)
                || is_guard
                || self.whitelist.matches(&decl.name),
            is_guard,
        }
    }
}
