// Copyright 2025 Cowboy AI, LLC.

//! Composite model construction
//!
//! Turns a [`CompositeDeclaration`] into a [`CompositeModel`]:
//!
//! 1. explicit fragment lists are merged with the declarations found on
//!    every type of the type set (most specific type first)
//! 2. every method of every type is bound to a mixin, a concern chain, a
//!    side-effect list and parameter constraints
//! 3. types requested through this-scoped dependencies are implemented too
//! 4. state slots are derived from accessors and mixin fields

use super::{
    CompositeDeclaration, CompositeKind, CompositeMethodModel, CompositeModel, ConstraintModel,
    DefaultValuePolicy, FragmentModel, MethodConstraintsModel, QualifiedName, StateDeclarations,
    StateDescriptor, StateModel, ValueConstraintsModel,
};
use crate::errors::{AssemblyError, TypeList};
use crate::fragment::{AssemblyHelper, FragmentClass, FragmentHandle, FragmentKind};
use crate::meta_info::MetaInfo;
use crate::types::{
    names, Annotation, FragmentDeclarations, MethodDeclaration, MethodKey, StateKind, TypeName,
    TypeUniverse, ValueType,
};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Builds composite models for one assembly pass
pub struct CompositeModelBuilder<'a> {
    helper: &'a AssemblyHelper,
    state_declarations: &'a StateDeclarations,
}

impl<'a> CompositeModelBuilder<'a> {
    /// Builder sharing `helper`'s fragment cache
    pub fn new(helper: &'a AssemblyHelper, state_declarations: &'a StateDeclarations) -> Self {
        Self {
            helper,
            state_declarations,
        }
    }

    /// Compile a declaration
    pub fn build(&self, declaration: &CompositeDeclaration) -> Result<CompositeModel, AssemblyError> {
        let universe = self.helper.universe().clone();
        if declaration.types.is_empty() {
            return Err(AssemblyError::InvalidComposite {
                types: TypeList::default(),
                reason: "type set must not be empty".to_string(),
            });
        }
        for type_name in &declaration.types {
            if !universe.contains(type_name) {
                return Err(AssemblyError::UnknownType(type_name.clone()));
            }
        }

        let mut types = declaration.types.clone();
        let base = TypeName::new(declaration.kind.base_type());
        if !types.contains(&base) {
            types.push(base);
        }

        let mut meta_info = MetaInfo::new();
        for type_name in &types {
            for t in universe.meta_info_order(type_name) {
                if let Some(descriptor) = universe.descriptor(&t) {
                    for annotation in &descriptor.annotations {
                        meta_info.add_annotation(annotation.clone());
                    }
                }
            }
        }
        meta_info.merge(&declaration.meta_info);
        let immutable =
            declaration.kind == CompositeKind::Value || meta_info.has_annotation(names::IMMUTABLE);

        let declared = DeclaredFragments::explicit(declaration).extended(&universe, &types);

        let mut build = CompositeBuild {
            helper: self.helper,
            universe: &universe,
            state_declarations: self.state_declarations,
            types: types.clone(),
            immutable,
            mixins: Vec::new(),
            mixin_index: IndexMap::new(),
            mixin_types: Vec::new(),
            methods: IndexMap::new(),
            state: StateModel::default(),
        };
        build.implement_mixin_types(&types, &declared)?;
        build.add_state(&declared.constraints)?;

        debug!(
            composite = %types[0],
            kind = declaration.kind.as_str(),
            methods = build.methods.len(),
            mixins = build.mixins.len(),
            state = build.state.len(),
            "composite model built"
        );

        Ok(CompositeModel {
            kind: declaration.kind,
            types,
            mixin_types: build.mixin_types,
            mixins: build.mixins,
            methods: build.methods,
            state: build.state,
            immutable,
            meta_info,
        })
    }
}

/// Fragment class lists in resolution order
#[derive(Debug, Clone, Default)]
struct DeclaredFragments {
    mixins: Vec<TypeName>,
    concerns: Vec<TypeName>,
    side_effects: Vec<TypeName>,
    constraints: Vec<TypeName>,
}

impl DeclaredFragments {
    fn explicit(declaration: &CompositeDeclaration) -> Self {
        Self {
            mixins: declaration.mixins.clone(),
            concerns: declaration.concerns.clone(),
            side_effects: declaration.side_effects.clone(),
            constraints: declaration.constraints.clone(),
        }
    }

    /// Append the declarations of `types` and all their supertypes
    fn extended(mut self, universe: &TypeUniverse, types: &[TypeName]) -> Self {
        for type_name in types {
            for t in universe.types_of(type_name) {
                if let Some(descriptor) = universe.descriptor(&t) {
                    self.append(&descriptor.declarations);
                }
            }
        }
        self
    }

    fn append(&mut self, declarations: &FragmentDeclarations) {
        self.mixins.extend(declarations.mixins.iter().cloned());
        self.concerns.extend(declarations.concerns.iter().cloned());
        self.side_effects
            .extend(declarations.side_effects.iter().cloned());
        self.constraints
            .extend(declarations.constraints.iter().cloned());
    }
}

struct CompositeBuild<'b> {
    helper: &'b AssemblyHelper,
    universe: &'b TypeUniverse,
    state_declarations: &'b StateDeclarations,
    types: Vec<TypeName>,
    immutable: bool,
    mixins: Vec<FragmentModel>,
    mixin_index: IndexMap<TypeName, usize>,
    mixin_types: Vec<TypeName>,
    methods: IndexMap<MethodKey, CompositeMethodModel>,
    state: StateModel,
}

impl CompositeBuild<'_> {
    fn type_list(&self) -> TypeList {
        TypeList::from(&self.types[..])
    }

    fn primary(&self) -> TypeName {
        self.types[0].clone()
    }

    fn implement_mixin_types(
        &mut self,
        mixin_types: &[TypeName],
        declared: &DeclaredFragments,
    ) -> Result<(), AssemblyError> {
        let mut this_dependencies: IndexSet<TypeName> = IndexSet::new();

        for mixin_type in mixin_types {
            let methods: Vec<MethodDeclaration> = self
                .universe
                .methods_of(mixin_type)
                .into_iter()
                .cloned()
                .collect();
            for method in methods {
                if method.is_static || self.methods.contains_key(&method.key()) {
                    continue;
                }
                let mixin = self.implement_method(&method, &declared.mixins)?;
                let mixin_class = self.mixins[mixin].class().clone();

                let concerns =
                    self.chain_for(&method, &mixin_class, &declared.concerns, FragmentKind::Concern)?;
                let side_effects = self.chain_for(
                    &method,
                    &mixin_class,
                    &declared.side_effects,
                    FragmentKind::SideEffect,
                )?;
                let constraints = self.constraints_for(&method, &mixin_class, &declared.constraints)?;

                this_dependencies.extend(self.mixins[mixin].this_types().cloned());
                for fragment in concerns.iter().chain(side_effects.iter()) {
                    this_dependencies.extend(fragment.this_types().cloned());
                }
                this_dependencies.extend(self.universe.interfaces_of(mixin_class.name()));

                let index = self.methods.len();
                trace!(method = %method.signature(), mixin = %mixin_class.name(), "method implemented");
                self.methods.insert(
                    method.key(),
                    CompositeMethodModel {
                        index,
                        method,
                        mixin,
                        constraints,
                        concerns,
                        side_effects,
                    },
                );
            }
            if !self.mixin_types.contains(mixin_type) {
                self.mixin_types.push(mixin_type.clone());
            }
        }

        for dependency in this_dependencies {
            if self.mixin_types.contains(&dependency) {
                continue;
            }
            if !self.universe.contains(&dependency) {
                return Err(AssemblyError::UnknownType(dependency));
            }
            let mut extended = declared.clone();
            for t in self.universe.types_of(&dependency) {
                if let Some(descriptor) = self.universe.descriptor(&t) {
                    extended.append(&descriptor.declarations);
                }
            }
            self.implement_mixin_types(std::slice::from_ref(&dependency), &extended)?;
        }
        Ok(())
    }

    fn implement_method(
        &mut self,
        method: &MethodDeclaration,
        candidates: &[TypeName],
    ) -> Result<usize, AssemblyError> {
        let handle = self
            .helper
            .resolve_fragment(method, candidates, &self.types)?;
        Ok(self.use_mixin(handle))
    }

    fn use_mixin(&mut self, handle: Arc<FragmentHandle>) -> usize {
        if let Some(index) = self.mixin_index.get(handle.name()) {
            return *index;
        }
        let index = self.mixins.len();
        self.mixin_index.insert(handle.name().clone(), index);
        self.mixins.push(FragmentModel::new(handle));
        index
    }

    fn fragment_applies(
        &self,
        handle: &FragmentHandle,
        method: &MethodDeclaration,
        mixin_class: &FragmentClass,
    ) -> bool {
        let primary = self.primary();
        if self
            .helper
            .applies_to(handle, method, &primary, mixin_class.name())
        {
            return true;
        }
        // retry against the mixin's own declaration of the method
        match mixin_class.descriptor().find_method(&method.name) {
            Some(mixin_method) => {
                self.helper
                    .applies_to(handle, mixin_method, &primary, mixin_class.name())
            }
            None => false,
        }
    }

    /// Concern or side-effect chain for a method
    ///
    /// Declarations on the mixin class come first, then the composite's,
    /// then those carried by the method's annotations. A fragment that
    /// applies again is moved to its latest position.
    fn chain_for(
        &self,
        method: &MethodDeclaration,
        mixin_class: &FragmentClass,
        declared: &[TypeName],
        kind: FragmentKind,
    ) -> Result<Vec<FragmentModel>, AssemblyError> {
        let own = match kind {
            FragmentKind::Concern => &mixin_class.descriptor().declarations.concerns,
            _ => &mixin_class.descriptor().declarations.side_effects,
        };

        let mut chain: Vec<Arc<FragmentHandle>> = Vec::new();
        let mut add = |handle: Arc<FragmentHandle>| {
            chain.retain(|h| h.name() != handle.name());
            chain.push(handle);
        };

        for name in own.iter().chain(declared.iter()) {
            let handle = self.helper.fragment(name, kind)?;
            if self.fragment_applies(&handle, method, mixin_class) {
                add(handle);
            }
        }

        for annotation in &method.annotations {
            let Some(meta) = self.universe.annotation_meta(&annotation.annotation_type) else {
                continue;
            };
            let from_annotation = match kind {
                FragmentKind::Concern => &meta.concerns,
                _ => &meta.side_effects,
            };
            for name in from_annotation {
                let handle = self.helper.fragment(name, kind)?;
                if self.fragment_applies(&handle, method, mixin_class) {
                    add(handle);
                }
            }
        }

        Ok(chain.into_iter().map(FragmentModel::new).collect())
    }

    fn constraints_for(
        &self,
        method: &MethodDeclaration,
        mixin_class: &FragmentClass,
        declared: &[TypeName],
    ) -> Result<MethodConstraintsModel, AssemblyError> {
        let classes: Vec<TypeName> = mixin_class
            .descriptor()
            .declarations
            .constraints
            .iter()
            .chain(declared.iter())
            .cloned()
            .collect();

        // constraint annotations on the method itself apply to every argument
        let method_level: Vec<&Annotation> = method
            .annotations
            .iter()
            .filter(|a| self.universe.is_constraint_declaration(&a.annotation_type))
            .collect();

        let member = format!("method {}", method.name);
        let mut parameters = Vec::with_capacity(method.parameters.len());
        for (i, parameter) in method.parameters.iter().enumerate() {
            let name = parameter
                .name
                .clone()
                .unwrap_or_else(|| format!("param{}", i + 1));
            let optional = parameter.annotations.iter().any(|a| a.is(names::OPTIONAL));
            let annotations = parameter
                .annotations
                .iter()
                .chain(method_level.iter().copied());
            let constraints =
                self.value_constraints(annotations, &parameter.value_type, &member, &classes)?;
            parameters.push(ValueConstraintsModel::new(name, optional, constraints));
        }
        Ok(MethodConstraintsModel::new(parameters))
    }

    fn value_constraints<'x>(
        &self,
        annotations: impl Iterator<Item = &'x Annotation>,
        value_type: &ValueType,
        member: &str,
        classes: &[TypeName],
    ) -> Result<Vec<ConstraintModel>, AssemblyError> {
        annotations
            .filter(|a| self.universe.is_constraint_declaration(&a.annotation_type))
            .map(|a| self.constraint_model(a, value_type, member, classes))
            .collect()
    }

    /// Resolve one constraint annotation: declared classes first, then the
    /// classes named by the annotation, then composition
    fn constraint_model(
        &self,
        annotation: &Annotation,
        value_type: &ValueType,
        member: &str,
        classes: &[TypeName],
    ) -> Result<ConstraintModel, AssemblyError> {
        let matching = |names: &[TypeName]| -> Result<Option<ConstraintModel>, AssemblyError> {
            for name in names {
                let class = self
                    .universe
                    .constraint(name)
                    .ok_or_else(|| AssemblyError::UnknownType(name.clone()))?;
                if class.annotation() == &annotation.annotation_type
                    && class.value_type().accepts(value_type, self.universe)
                {
                    return Ok(Some(ConstraintModel::Simple {
                        annotation: annotation.clone(),
                        class: class.clone(),
                    }));
                }
            }
            Ok(None)
        };

        if let Some(model) = matching(classes)? {
            return Ok(model);
        }

        if let Some(meta) = self.universe.annotation_meta(&annotation.annotation_type) {
            if let Some(model) = matching(&meta.constraints)? {
                return Ok(model);
            }

            let composed: Vec<&Annotation> = meta
                .composed_of
                .iter()
                .filter(|a| {
                    a.annotation_type != annotation.annotation_type
                        && self.universe.is_constraint_declaration(&a.annotation_type)
                })
                .collect();
            if !composed.is_empty() {
                let constraints = composed
                    .into_iter()
                    .map(|a| self.constraint_model(a, value_type, member, classes))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(ConstraintModel::Composite {
                    annotation: annotation.clone(),
                    constraints,
                });
            }
        }

        Err(AssemblyError::UnresolvedConstraint {
            annotation: annotation.annotation_type.clone(),
            value_type: value_type.to_string(),
            member: member.to_string(),
            types: self.type_list(),
        })
    }

    /// Register state from zero-argument accessors, then from mixin fields
    fn add_state(&mut self, constraint_classes: &[TypeName]) -> Result<(), AssemblyError> {
        let accessors: Vec<MethodDeclaration> = self
            .methods
            .values()
            .filter(|m| m.method.is_state_accessor())
            .map(|m| m.method.clone())
            .collect();
        for accessor in &accessors {
            self.add_state_for(accessor, constraint_classes)?;
        }

        let fields: Vec<MethodDeclaration> = self
            .mixins
            .iter()
            .flat_map(|mixin| {
                let class = mixin.class();
                class
                    .state_fields()
                    .iter()
                    .map(|field| field.as_accessor(class.name()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for field in &fields {
            self.add_state_for(field, constraint_classes)?;
        }
        Ok(())
    }

    fn add_state_for(
        &mut self,
        accessor: &MethodDeclaration,
        constraint_classes: &[TypeName],
    ) -> Result<(), AssemblyError> {
        let Some(kind) = accessor.returns.state_kind() else {
            return Ok(());
        };
        let qualified_name = QualifiedName::new(accessor.declaring_type.clone(), accessor.name.clone());
        if self.state.get(&accessor.name).is_some() {
            trace!(state = %qualified_name, "state already registered, skipping");
            return Ok(());
        }

        let value_type = accessor
            .returns
            .state_value_type()
            .unwrap_or(ValueType::Any);
        let declaration = self
            .state_declarations
            .get(&qualified_name)
            .cloned()
            .unwrap_or_default();

        let optional = accessor.has_annotation(names::OPTIONAL) || declaration.optional;
        let member = format!("state {qualified_name}");
        let constraints = self.value_constraints(
            accessor.annotations.iter(),
            &value_type,
            &member,
            constraint_classes,
        )?;

        let use_defaults = accessor
            .annotations
            .iter()
            .find(|a| a.is(names::USE_DEFAULTS));
        let default = match (declaration.initial_value, use_defaults) {
            (Some(value), _) => DefaultValuePolicy::Initial(value),
            (None, Some(annotation)) => match annotation.value("value") {
                Some(value) => DefaultValuePolicy::Initial(value.clone()),
                None => DefaultValuePolicy::UseDefaults,
            },
            (None, None) if declaration.use_defaults => DefaultValuePolicy::UseDefaults,
            (None, None) => match kind {
                StateKind::ManyAssociation | StateKind::NamedAssociation => {
                    DefaultValuePolicy::UseDefaults
                }
                StateKind::Property | StateKind::Association => DefaultValuePolicy::Null,
            },
        };
        let immutable =
            self.immutable || accessor.has_annotation(names::IMMUTABLE) || declaration.immutable;

        self.state.register(StateDescriptor {
            constraints: ValueConstraintsModel::new(accessor.name.clone(), optional, constraints),
            qualified_name,
            kind,
            value_type,
            immutable,
            default,
        });
        Ok(())
    }
}
