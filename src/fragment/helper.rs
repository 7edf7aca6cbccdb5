// Copyright 2025 Cowboy AI, LLC.

//! Fragment resolution and the per-assembly fragment cache

use super::{AppliesTo, AppliesToContext, FragmentClass, FragmentKind};
use crate::errors::{AssemblyError, TypeList};
use crate::types::{MethodDeclaration, TypeName, TypeUniverse};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A fragment class prepared for use by composite models
///
/// Holds the class together with its compiled applies-to predicate. One
/// handle exists per fragment class per [`AssemblyHelper`].
#[derive(Debug)]
pub struct FragmentHandle {
    class: Arc<FragmentClass>,
    filter: AppliesTo,
}

impl FragmentHandle {
    fn compile(class: Arc<FragmentClass>) -> Self {
        let mut clauses = Vec::new();
        if !class.is_generic() {
            // typed fragments only serve methods of the interfaces they implement
            let name = class.name().clone();
            clauses.push(AppliesTo::filter(move |ctx: &AppliesToContext<'_>| {
                ctx.universe.is_assignable(&name, &ctx.method.declaring_type)
            }));
        }
        clauses.extend(class.applies_to_sites().iter().cloned());
        Self {
            class,
            filter: AppliesTo::AllOf(clauses),
        }
    }

    /// The fragment class
    pub fn class(&self) -> &Arc<FragmentClass> {
        &self.class
    }

    /// Class name
    pub fn name(&self) -> &TypeName {
        self.class.name()
    }

    /// Whether the compiled predicate accepts the triple
    pub fn applies_to(&self, context: &AppliesToContext<'_>) -> bool {
        self.filter.evaluate(context)
    }
}

/// Shared state of one assembly pass
///
/// Memoizes fragment handles per class so every composite built by the
/// same pass reuses them.
#[derive(Debug)]
pub struct AssemblyHelper {
    universe: Arc<TypeUniverse>,
    handles: Mutex<HashMap<TypeName, Arc<FragmentHandle>>>,
}

impl AssemblyHelper {
    /// Helper over `universe`
    pub fn new(universe: Arc<TypeUniverse>) -> Self {
        Self {
            universe,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// The type table
    pub fn universe(&self) -> &Arc<TypeUniverse> {
        &self.universe
    }

    /// Number of memoized handles
    pub fn cached_handles(&self) -> usize {
        self.handles.lock().len()
    }

    /// Handle of a fragment class, checking its kind
    pub fn fragment(
        &self,
        name: &TypeName,
        expected: FragmentKind,
    ) -> Result<Arc<FragmentHandle>, AssemblyError> {
        let mut handles = self.handles.lock();
        let handle = match handles.get(name) {
            Some(handle) => handle.clone(),
            None => {
                let class = self
                    .universe
                    .fragment(name)
                    .cloned()
                    .ok_or_else(|| AssemblyError::UnknownType(name.clone()))?;
                let handle = Arc::new(FragmentHandle::compile(class));
                handles.insert(name.clone(), handle.clone());
                handle
            }
        };
        if handle.class.kind() != expected {
            return Err(AssemblyError::WrongFragmentKind {
                fragment: name.clone(),
                expected: expected.as_str(),
            });
        }
        Ok(handle)
    }

    /// Whether `handle` applies to `method` implemented by `mixin` in `composite`
    pub fn applies_to(
        &self,
        handle: &FragmentHandle,
        method: &MethodDeclaration,
        composite: &TypeName,
        mixin: &TypeName,
    ) -> bool {
        handle.applies_to(&AppliesToContext {
            method,
            mixin,
            composite,
            fragment: handle.name(),
            universe: &self.universe,
        })
    }

    /// Pick the mixin implementing `method` from `candidates`
    ///
    /// Typed candidates assignable to the declaring type win when they are
    /// generic-capable or pass their applies-to; otherwise the first
    /// generic-capable candidate whose applies-to accepts is used.
    pub fn resolve_fragment(
        &self,
        method: &MethodDeclaration,
        candidates: &[TypeName],
        types: &[TypeName],
    ) -> Result<Arc<FragmentHandle>, AssemblyError> {
        let composite = types
            .first()
            .cloned()
            .unwrap_or_else(|| method.declaring_type.clone());

        let mut handles = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            handles.push(self.fragment(candidate, FragmentKind::Mixin)?);
        }

        let typed = handles.iter().find(|handle| {
            self.universe
                .is_assignable(handle.name(), &method.declaring_type)
                && (handle.class.is_generic()
                    || self.applies_to(handle, method, &composite, handle.name()))
        });
        if let Some(handle) = typed {
            trace!(method = %method.signature(), mixin = %handle.name(), "typed mixin resolved");
            return Ok(handle.clone());
        }

        let generic = handles.iter().find(|handle| {
            handle.class.is_generic() && self.applies_to(handle, method, &composite, handle.name())
        });
        match generic {
            Some(handle) => {
                trace!(method = %method.signature(), mixin = %handle.name(), "generic mixin resolved");
                Ok(handle.clone())
            }
            None => Err(AssemblyError::UnresolvedFragment {
                method: method.signature(),
                types: TypeList::from(types),
            }),
        }
    }
}
