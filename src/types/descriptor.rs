// Copyright 2025 Cowboy AI, LLC.

use super::{TypeName, ValueType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// An annotation instance attached to a type, method, parameter or field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation type
    pub annotation_type: TypeName,
    /// Attribute values
    #[serde(default)]
    pub values: serde_json::Map<String, Value>,
}

impl Annotation {
    /// Annotation without attributes
    pub fn new(annotation_type: impl Into<TypeName>) -> Self {
        Self {
            annotation_type: annotation_type.into(),
            values: serde_json::Map::new(),
        }
    }

    /// Add an attribute
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Read an attribute
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether this annotation is of the given type
    pub fn is(&self, annotation_type: &str) -> bool {
        self.annotation_type == annotation_type
    }
}

/// Kind of state an accessor exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// Single value
    Property,
    /// Reference to one entity
    Association,
    /// Ordered references to entities
    ManyAssociation,
    /// Named references to entities
    NamedAssociation,
}

/// What a method returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnKind {
    /// Nothing
    Unit,
    /// An ordinary value
    Value(ValueType),
    /// A property of the given type
    Property(ValueType),
    /// An association to the given entity type
    Association(TypeName),
    /// A many-association to the given entity type
    ManyAssociation(TypeName),
    /// A named-association to the given entity type
    NamedAssociation(TypeName),
}

impl ReturnKind {
    /// The state kind this return exposes, if any
    pub fn state_kind(&self) -> Option<StateKind> {
        match self {
            ReturnKind::Property(_) => Some(StateKind::Property),
            ReturnKind::Association(_) => Some(StateKind::Association),
            ReturnKind::ManyAssociation(_) => Some(StateKind::ManyAssociation),
            ReturnKind::NamedAssociation(_) => Some(StateKind::NamedAssociation),
            ReturnKind::Unit | ReturnKind::Value(_) => None,
        }
    }

    /// Type of the state value, for constraint matching
    pub fn state_value_type(&self) -> Option<ValueType> {
        match self {
            ReturnKind::Property(t) => Some(t.clone()),
            ReturnKind::Association(t) => Some(ValueType::Composite(t.clone())),
            ReturnKind::ManyAssociation(t) => {
                Some(ValueType::collection(ValueType::Composite(t.clone())))
            }
            ReturnKind::NamedAssociation(t) => {
                Some(ValueType::map(ValueType::Composite(t.clone())))
            }
            ReturnKind::Unit | ReturnKind::Value(_) => None,
        }
    }
}

/// A declared method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    /// Declared name; `param{n}` is used when absent
    pub name: Option<String>,
    /// Declared type
    pub value_type: ValueType,
    /// Annotations (constraints, optional)
    pub annotations: Vec<Annotation>,
}

/// Identity of a method inside a composite: declaring type plus name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodKey {
    /// Declaring type
    pub declaring_type: TypeName,
    /// Method name
    pub name: String,
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

/// A method declared by an interface or implemented by a fragment class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDeclaration {
    /// Type declaring the method; filled in when added to a descriptor
    pub declaring_type: TypeName,
    /// Method name
    pub name: String,
    /// Parameters in order
    pub parameters: Vec<ParameterDeclaration>,
    /// Result
    pub returns: ReturnKind,
    /// Method annotations
    pub annotations: Vec<Annotation>,
    /// Static methods are never implemented by mixins
    pub is_static: bool,
}

impl MethodDeclaration {
    /// A method returning nothing
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            declaring_type: TypeName::new(""),
            name: name.into(),
            parameters: Vec::new(),
            returns: ReturnKind::Unit,
            annotations: Vec::new(),
            is_static: false,
        }
    }

    /// A property accessor
    pub fn property(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name).with_returns(ReturnKind::Property(value_type))
    }

    /// An association accessor
    pub fn association(name: impl Into<String>, entity_type: impl Into<TypeName>) -> Self {
        Self::new(name).with_returns(ReturnKind::Association(entity_type.into()))
    }

    /// A many-association accessor
    pub fn many_association(name: impl Into<String>, entity_type: impl Into<TypeName>) -> Self {
        Self::new(name).with_returns(ReturnKind::ManyAssociation(entity_type.into()))
    }

    /// A named-association accessor
    pub fn named_association(name: impl Into<String>, entity_type: impl Into<TypeName>) -> Self {
        Self::new(name).with_returns(ReturnKind::NamedAssociation(entity_type.into()))
    }

    /// Add a parameter
    pub fn param(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.param_annotated(name, value_type, Vec::new())
    }

    /// Add a parameter carrying annotations
    pub fn param_annotated(
        mut self,
        name: impl Into<String>,
        value_type: ValueType,
        annotations: Vec<Annotation>,
    ) -> Self {
        self.parameters.push(ParameterDeclaration {
            name: Some(name.into()),
            value_type,
            annotations,
        });
        self
    }

    /// Add an unnamed parameter
    pub fn unnamed_param(mut self, value_type: ValueType, annotations: Vec<Annotation>) -> Self {
        self.parameters.push(ParameterDeclaration {
            name: None,
            value_type,
            annotations,
        });
        self
    }

    /// Set the result to an ordinary value
    pub fn returns(self, value_type: ValueType) -> Self {
        self.with_returns(ReturnKind::Value(value_type))
    }

    /// Set the result kind
    pub fn with_returns(mut self, returns: ReturnKind) -> Self {
        self.returns = returns;
        self
    }

    /// Add a method annotation
    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Mark as static
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Key of this method inside a composite
    pub fn key(&self) -> MethodKey {
        MethodKey {
            declaring_type: self.declaring_type.clone(),
            name: self.name.clone(),
        }
    }

    /// Whether the method carries an annotation of the given type
    pub fn has_annotation(&self, annotation_type: &str) -> bool {
        self.annotations.iter().any(|a| a.is(annotation_type))
    }

    /// Zero-argument accessor of state
    pub fn is_state_accessor(&self) -> bool {
        self.parameters.is_empty() && self.returns.state_kind().is_some()
    }

    /// Human readable signature, e.g. `Account.deposit(Integer)`
    pub fn signature(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| p.value_type.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}.{}({})", self.declaring_type, self.name, params)
    }
}

/// Kind of registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// Composite interface
    Interface,
    /// Fragment or object class
    Class,
    /// Annotation type
    Annotation,
}

/// Fragment declarations attached to a type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentDeclarations {
    /// Mixin classes, in declaration order
    pub mixins: Vec<TypeName>,
    /// Concern classes, in declaration order
    pub concerns: Vec<TypeName>,
    /// Side-effect classes, in declaration order
    pub side_effects: Vec<TypeName>,
    /// Constraint classes, in declaration order
    pub constraints: Vec<TypeName>,
}

/// What an annotation type means to the runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationMeta {
    /// Meta-annotated as constraint-declaring
    pub constraint_declaration: bool,
    /// Constraint classes the annotation names itself
    pub constraints: Vec<TypeName>,
    /// Concerns applied to methods carrying the annotation
    pub concerns: Vec<TypeName>,
    /// Side-effects applied to methods carrying the annotation
    pub side_effects: Vec<TypeName>,
    /// Constraint annotations this annotation is composed of
    pub composed_of: Vec<Annotation>,
}

/// A registered interface, class or annotation type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Fully-qualified name
    pub name: TypeName,
    /// Interface, class or annotation
    pub kind: TypeKind,
    /// Direct supertypes in declaration order
    pub supertypes: Vec<TypeName>,
    /// Declared methods
    pub methods: Vec<MethodDeclaration>,
    /// Type-level annotations (meta info)
    pub annotations: Vec<Annotation>,
    /// Fragment declarations on this type
    pub declarations: FragmentDeclarations,
    /// Present on annotation types only
    pub annotation_meta: Option<AnnotationMeta>,
}

impl TypeDescriptor {
    fn with_kind(name: impl Into<TypeName>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            supertypes: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            declarations: FragmentDeclarations::default(),
            annotation_meta: (kind == TypeKind::Annotation).then(AnnotationMeta::default),
        }
    }

    /// Describe an interface
    pub fn interface(name: impl Into<TypeName>) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    /// Describe a class
    pub fn class(name: impl Into<TypeName>) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    /// Describe an annotation type
    pub fn annotation(name: impl Into<TypeName>) -> Self {
        Self::with_kind(name, TypeKind::Annotation)
    }

    /// Describe a constraint-declaring annotation type
    pub fn constraint_annotation(name: impl Into<TypeName>) -> Self {
        let mut descriptor = Self::annotation(name);
        descriptor.meta_mut().constraint_declaration = true;
        descriptor
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        self.annotation_meta.get_or_insert_with(AnnotationMeta::default)
    }

    /// Add a supertype
    pub fn extends(mut self, supertype: impl Into<TypeName>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    /// Add a method; its declaring type becomes this type
    pub fn method(mut self, mut method: MethodDeclaration) -> Self {
        method.declaring_type = self.name.clone();
        self.methods.push(method);
        self
    }

    /// Add a type annotation
    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Declare mixins
    pub fn mixins<I, T>(mut self, mixins: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.declarations.mixins.extend(mixins.into_iter().map(Into::into));
        self
    }

    /// Declare concerns
    pub fn concerns<I, T>(mut self, concerns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.declarations.concerns.extend(concerns.into_iter().map(Into::into));
        self
    }

    /// Declare side-effects
    pub fn side_effects<I, T>(mut self, side_effects: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.declarations
            .side_effects
            .extend(side_effects.into_iter().map(Into::into));
        self
    }

    /// Declare constraints
    pub fn constraints<I, T>(mut self, constraints: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.declarations
            .constraints
            .extend(constraints.into_iter().map(Into::into));
        self
    }

    /// Annotation types only: constraint classes named by the annotation itself
    pub fn implemented_by<I, T>(mut self, constraints: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.meta_mut()
            .constraints
            .extend(constraints.into_iter().map(Into::into));
        self
    }

    /// Annotation types only: compose this constraint from other constraint annotations
    pub fn composed_of(mut self, annotation: Annotation) -> Self {
        let meta = self.meta_mut();
        meta.constraint_declaration = true;
        meta.composed_of.push(annotation);
        self
    }

    /// Annotation types only: concerns applied wherever the annotation appears
    pub fn annotation_concerns<I, T>(mut self, concerns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.meta_mut()
            .concerns
            .extend(concerns.into_iter().map(Into::into));
        self
    }

    /// Annotation types only: side-effects applied wherever the annotation appears
    pub fn annotation_side_effects<I, T>(mut self, side_effects: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.meta_mut()
            .side_effects
            .extend(side_effects.into_iter().map(Into::into));
        self
    }

    /// Whether the type carries an annotation of the given type
    pub fn has_annotation(&self, annotation_type: &str) -> bool {
        self.annotations.iter().any(|a| a.is(annotation_type))
    }

    /// Find a declared method by name
    pub fn find_method(&self, name: &str) -> Option<&MethodDeclaration> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Whether this is a constraint-declaring annotation type
    pub fn is_constraint_declaration(&self) -> bool {
        self.annotation_meta
            .as_ref()
            .is_some_and(|meta| meta.constraint_declaration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_added_to_type_gets_declaring_type() {
        let account = TypeDescriptor::interface("Account")
            .method(MethodDeclaration::new("deposit").param("amount", ValueType::Integer));
        let deposit = account.find_method("deposit").unwrap();
        assert_eq!(deposit.declaring_type, "Account");
        assert_eq!(deposit.signature(), "Account.deposit(Integer)");
        assert!(!deposit.is_state_accessor());
    }

    #[test]
    fn test_state_accessor_detection() {
        let name = MethodDeclaration::property("name", ValueType::String);
        assert!(name.is_state_accessor());
        assert_eq!(name.returns.state_kind(), Some(StateKind::Property));

        let owner = MethodDeclaration::association("owner", "Person");
        assert_eq!(
            owner.returns.state_value_type(),
            Some(ValueType::Composite("Person".into()))
        );
    }

    #[test]
    fn test_composed_annotation_is_constraint_declaring() {
        let annotation = TypeDescriptor::annotation("Email")
            .composed_of(Annotation::new("NotEmpty"))
            .composed_of(Annotation::new("Matches").with("regex", ".+@.+"));
        assert!(annotation.is_constraint_declaration());
        let meta = annotation.annotation_meta.unwrap();
        assert_eq!(meta.composed_of.len(), 2);
        assert_eq!(
            meta.composed_of[1].value("regex"),
            Some(&Value::String(".+@.+".to_string()))
        );
    }
}
