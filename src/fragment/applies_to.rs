// Copyright 2025 Cowboy AI, LLC.

use crate::types::{MethodDeclaration, TypeName, TypeUniverse};
use std::fmt;
use std::sync::Arc;

/// The (method, mixin, composite) triple an applies-to predicate is asked about
#[derive(Clone, Copy)]
pub struct AppliesToContext<'a> {
    /// Method being assembled
    pub method: &'a MethodDeclaration,
    /// Mixin class implementing the method
    pub mixin: &'a TypeName,
    /// Primary type of the composite
    pub composite: &'a TypeName,
    /// Fragment being tested
    pub fragment: &'a TypeName,
    /// Type table
    pub universe: &'a TypeUniverse,
}

/// User-supplied applies-to predicate
pub trait AppliesToFilter: Send + Sync {
    /// Whether the fragment serves this method
    fn applies_to(&self, context: &AppliesToContext<'_>) -> bool;
}

impl<F> AppliesToFilter for F
where
    F: Fn(&AppliesToContext<'_>) -> bool + Send + Sync,
{
    fn applies_to(&self, context: &AppliesToContext<'_>) -> bool {
        self(context)
    }
}

/// Composable applies-to predicate
///
/// One declaration site is an `AnyOf` of its entries; separate sites are
/// combined with `AllOf`.
#[derive(Clone)]
pub enum AppliesTo {
    /// The method's declaring type is assignable to the given type
    Type(TypeName),
    /// The method carries the given annotation
    Annotation(TypeName),
    /// Explicit filter
    Filter(Arc<dyn AppliesToFilter>),
    /// Any entry accepts
    AnyOf(Vec<AppliesTo>),
    /// Every entry accepts
    AllOf(Vec<AppliesTo>),
}

impl AppliesTo {
    /// Type-check predicate
    pub fn type_check(target: impl Into<TypeName>) -> Self {
        AppliesTo::Type(target.into())
    }

    /// Annotation-presence predicate
    pub fn annotation(annotation_type: impl Into<TypeName>) -> Self {
        AppliesTo::Annotation(annotation_type.into())
    }

    /// Explicit filter predicate
    pub fn filter(filter: impl AppliesToFilter + 'static) -> Self {
        AppliesTo::Filter(Arc::new(filter))
    }

    /// Evaluate against a method/mixin/composite triple
    pub fn evaluate(&self, context: &AppliesToContext<'_>) -> bool {
        match self {
            AppliesTo::Type(target) => context
                .universe
                .is_assignable(&context.method.declaring_type, target),
            AppliesTo::Annotation(annotation_type) => {
                context.method.has_annotation(annotation_type.as_str())
            }
            AppliesTo::Filter(filter) => filter.applies_to(context),
            AppliesTo::AnyOf(entries) => entries.iter().any(|e| e.evaluate(context)),
            AppliesTo::AllOf(entries) => entries.iter().all(|e| e.evaluate(context)),
        }
    }
}

impl fmt::Debug for AppliesTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppliesTo::Type(t) => write!(f, "Type({t})"),
            AppliesTo::Annotation(t) => write!(f, "Annotation({t})"),
            AppliesTo::Filter(_) => f.write_str("Filter(..)"),
            AppliesTo::AnyOf(entries) => f.debug_tuple("AnyOf").field(entries).finish(),
            AppliesTo::AllOf(entries) => f.debug_tuple("AllOf").field(entries).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Annotation, TypeDescriptor, ValueType};

    fn universe() -> TypeUniverse {
        TypeUniverse::builder()
            .register(TypeDescriptor::interface("Named"))
            .register(TypeDescriptor::interface("Person").extends("Named"))
            .register(TypeDescriptor::annotation("Audited"))
            .build()
            .unwrap()
    }

    fn eval(applies_to: &AppliesTo, method: &MethodDeclaration, universe: &TypeUniverse) -> bool {
        let mixin = TypeName::new("PersonMixin");
        let composite = TypeName::new("Person");
        let fragment = TypeName::new("Fragment");
        applies_to.evaluate(&AppliesToContext {
            method,
            mixin: &mixin,
            composite: &composite,
            fragment: &fragment,
            universe,
        })
    }

    fn method_on(declaring: &str) -> MethodDeclaration {
        let mut m = MethodDeclaration::property("name", ValueType::String);
        m.declaring_type = declaring.into();
        m
    }

    #[test]
    fn test_type_check_uses_declaring_type() {
        let universe = universe();
        let check = AppliesTo::type_check("Named");
        assert!(eval(&check, &method_on("Person"), &universe));
        assert!(eval(&check, &method_on("Named"), &universe));
        assert!(!eval(&check, &method_on("Other"), &universe));
    }

    #[test]
    fn test_annotation_check() {
        let universe = universe();
        let check = AppliesTo::annotation("Audited");
        let plain = method_on("Person");
        let audited = method_on("Person").annotated(Annotation::new("Audited"));
        assert!(!eval(&check, &plain, &universe));
        assert!(eval(&check, &audited, &universe));
    }

    /// OR within a site, AND across sites
    #[test]
    fn test_combinators() {
        let universe = universe();
        let site = AppliesTo::AnyOf(vec![
            AppliesTo::annotation("Audited"),
            AppliesTo::type_check("Named"),
        ]);
        let restricted = AppliesTo::AllOf(vec![
            site.clone(),
            AppliesTo::filter(|ctx: &AppliesToContext<'_>| ctx.method.name != "name"),
        ]);
        let method = method_on("Person");
        assert!(eval(&site, &method, &universe));
        assert!(!eval(&restricted, &method, &universe));
    }
}
