//! Identity diffing of declaration snapshots.
//!
//! The engine remembers which declaration objects it last handed to the sink. Because
//! declarations are never mutated in place, comparing object identities is enough to tell
//! what changed. The cache is only valid for the value transformer it was built with.

use crate::model::{DeclarationKey, Declarations, StyleDeclaration};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use std::rc::Rc;
use stylesync_css::value::ValueTransformer;

#[derive(Debug, Default, Clone)]
pub struct DeclarationDiff {
    pub added: Vec<Rc<StyleDeclaration>>,
    pub removed: Vec<Rc<StyleDeclaration>>,
    /// Keys written outside of the diff that no longer exist in the store
    pub stale: Vec<DeclarationKey>,
}

impl DeclarationDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.stale.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.stale.len()
    }
}

fn identity(declaration: &Rc<StyleDeclaration>) -> usize {
    Rc::as_ptr(declaration) as usize
}

#[derive(Debug, Default)]
pub struct DiffEngine {
    /// Declarations last handed to the sink, by address. Holding the `Rc` keeps the address
    /// from being reused.
    cache: IndexMap<usize, Rc<StyleDeclaration>>,
    transformer: Option<ValueTransformer>,
    /// Keys whose sheet content was written by someone else and must be rewritten
    reconcile: IndexSet<DeclarationKey>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes what changed since the previous call and makes `current` the new baseline
    pub fn diff(&mut self, current: &Declarations, transformer: Option<&ValueTransformer>) -> DeclarationDiff {
        let invalidated = self.transformer.as_ref() != transformer;
        if invalidated {
            debug!("diff: value transformer changed, invalidating {} cached declarations", self.cache.len());
        }

        let next: IndexMap<usize, Rc<StyleDeclaration>> =
            current.iter().map(|decl| (identity(decl), decl.clone())).collect();

        let removed: Vec<_> = self
            .cache
            .iter()
            .filter(|(id, _)| !next.contains_key(*id))
            .map(|(_, decl)| decl.clone())
            .collect();

        let mut added: Vec<_> = next
            .iter()
            .filter(|(id, _)| invalidated || !self.cache.contains_key(*id))
            .map(|(_, decl)| decl.clone())
            .collect();

        let mut stale = Vec::new();
        for key in self.reconcile.drain(..) {
            match current.get(&key) {
                Some(decl) => {
                    if !added.iter().any(|a| Rc::ptr_eq(a, decl)) {
                        added.push(decl.clone());
                    }
                }
                None => {
                    if !removed.iter().any(|r| r.key() == key) {
                        stale.push(key);
                    }
                }
            }
        }

        self.cache = next;
        self.transformer = transformer.cloned();

        DeclarationDiff { added, removed, stale }
    }

    /// Marks keys whose sheet content may diverge from the store. The next diff rewrites them
    /// from the store, or deletes them when the store has no such declaration.
    pub fn reconcile(&mut self, keys: impl IntoIterator<Item = DeclarationKey>) {
        self.reconcile.extend(keys);
    }

    /// Forgets the baseline. The next diff reports every declaration as added.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.transformer = None;
        self.reconcile.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
