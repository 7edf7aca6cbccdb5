// Copyright 2025 Cowboy AI, LLC.

//! Queries over entities, executed by the visible entity finder
//!
//! Results are loaded through the unit of work that created the query, so
//! they share its tracked state.

use super::UnitOfWork;
use crate::errors::UnitOfWorkError;
use crate::runtime::CompositeInstance;
use crate::spi::{EntityFinder, QueryFilter, QuerySpecification, SortDirection};
use crate::types::TypeName;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Accumulates filters before a query is created
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    unit_of_work: UnitOfWork,
    result_type: TypeName,
    spec: QuerySpecification,
}

impl QueryBuilder {
    pub(crate) fn new(unit_of_work: UnitOfWork, result_type: TypeName) -> Self {
        Self {
            unit_of_work,
            result_type,
            spec: QuerySpecification::default(),
        }
    }

    /// Require a property to equal a value
    pub fn where_equals(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.spec
            .filters
            .insert(property.to_string(), QueryFilter::Equals(value.into()));
        self
    }

    /// Require a property to equal a variable bound later on the query
    pub fn where_variable(mut self, property: &str, variable: &str) -> Self {
        self.spec
            .filters
            .insert(property.to_string(), QueryFilter::Variable(variable.to_string()));
        self
    }

    /// Sort results by a property
    pub fn order_by(mut self, property: &str, direction: SortDirection) -> Self {
        self.spec.sort_by = Some((property.to_string(), direction));
        self
    }

    /// Create the query
    ///
    /// Every visible entity model implementing the result type qualifies.
    pub fn new_query(self) -> Result<Query, UnitOfWorkError> {
        self.unit_of_work.check_open()?;
        let module = self.unit_of_work.module();
        let models = module.type_lookup().lookup_entities(&self.result_type);
        if models.is_empty() {
            return Err(UnitOfWorkError::NoSuchEntityType {
                type_name: self.result_type,
                module: module.name().to_string(),
            });
        }
        let mut spec = self.spec;
        spec.result_types = models.iter().map(|m| m.primary_type().clone()).collect();
        Ok(Query {
            unit_of_work: self.unit_of_work,
            result_type: self.result_type,
            spec,
        })
    }
}

/// An executable entity query
#[derive(Debug, Clone)]
pub struct Query {
    unit_of_work: UnitOfWork,
    result_type: TypeName,
    spec: QuerySpecification,
}

impl Query {
    /// Skip the first `offset` results
    pub fn first_result(&mut self, offset: usize) -> &mut Self {
        self.spec.offset = Some(offset);
        self
    }

    /// Return at most `limit` results
    pub fn max_results(&mut self, limit: usize) -> &mut Self {
        self.spec.limit = Some(limit);
        self
    }

    /// Bind a variable used by [`QueryBuilder::where_variable`]
    pub fn set_variable(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.spec.variables.insert(name.to_string(), value.into());
        self
    }

    /// The specification handed to the finder
    pub fn specification(&self) -> &QuerySpecification {
        &self.spec
    }

    fn finder(&self) -> Result<Arc<dyn EntityFinder>, UnitOfWorkError> {
        self.unit_of_work.check_open()?;
        Ok(self.unit_of_work.module().entity_finder()?)
    }

    /// First matching entity
    pub fn find(&self) -> Result<Option<CompositeInstance>, UnitOfWorkError> {
        match self.finder()?.find_entity(&self.spec)? {
            Some(reference) => self.unit_of_work.get(self.result_type.clone(), reference).map(Some),
            None => Ok(None),
        }
    }

    /// All matching entities
    ///
    /// Entities removed in this unit of work, or deleted since the finder ran,
    /// are skipped.
    pub fn list(&self) -> Result<Vec<CompositeInstance>, UnitOfWorkError> {
        let references = self.finder()?.find_entities(&self.spec)?;
        trace!(query = %self.result_type, found = references.len(), "query executed");
        let mut entities = Vec::with_capacity(references.len());
        for reference in references {
            match self.unit_of_work.get(self.result_type.clone(), reference) {
                Ok(entity) => entities.push(entity),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(entities)
    }

    /// Number of matching entities, ignoring offset and limit
    pub fn count(&self) -> Result<usize, UnitOfWorkError> {
        Ok(self.finder()?.count_entities(&self.spec)?)
    }
}
