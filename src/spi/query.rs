// Copyright 2025 Cowboy AI, LLC.

//! Entity finder port and the query specification it executes

use super::{EntityReference, EntityState};
use crate::errors::EntityStoreError;
use crate::types::TypeName;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// Sort in ascending order
    Ascending,
    /// Sort in descending order
    Descending,
}

/// Right-hand side of a property filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryFilter {
    /// Property equals the value
    Equals(Value),
    /// Property equals the value bound to the variable
    Variable(String),
}

/// A query as handed to an [`EntityFinder`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpecification {
    /// Entity model types whose instances qualify
    pub result_types: Vec<TypeName>,
    /// Property filters, all of which must hold
    pub filters: IndexMap<String, QueryFilter>,
    /// Sort property and direction
    pub sort_by: Option<(String, SortDirection)>,
    /// Number of results to skip
    pub offset: Option<usize>,
    /// Maximum number of results
    pub limit: Option<usize>,
    /// Variable bindings
    pub variables: IndexMap<String, Value>,
}

impl QuerySpecification {
    /// Whether a stored state satisfies the type and filters
    ///
    /// An unbound variable matches nothing.
    pub fn matches(&self, state: &EntityState) -> bool {
        if !self.result_types.is_empty() && !self.result_types.contains(&state.entity_type) {
            return false;
        }
        self.filters.iter().all(|(property, filter)| {
            let expected = match filter {
                QueryFilter::Equals(value) => Some(value),
                QueryFilter::Variable(name) => self.variables.get(name),
            };
            match expected {
                Some(expected) => state.value(property).unwrap_or(&Value::Null) == expected,
                None => false,
            }
        })
    }

    /// Sort matching states and apply offset and limit
    pub fn window<'a>(&self, mut states: Vec<&'a EntityState>) -> Vec<&'a EntityState> {
        if let Some((property, direction)) = &self.sort_by {
            states.sort_by(|a, b| {
                let ordering = compare_values(
                    a.value(property).unwrap_or(&Value::Null),
                    b.value(property).unwrap_or(&Value::Null),
                );
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        states
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Executes queries on behalf of units of work
pub trait EntityFinder: Send + Sync {
    /// References of all matching entities, after sorting and windowing
    fn find_entities(
        &self,
        query: &QuerySpecification,
    ) -> Result<Vec<EntityReference>, EntityStoreError>;

    /// First matching entity
    fn find_entity(
        &self,
        query: &QuerySpecification,
    ) -> Result<Option<EntityReference>, EntityStoreError> {
        let mut first = query.clone();
        first.limit = Some(1);
        Ok(self.find_entities(&first)?.into_iter().next())
    }

    /// Number of matching entities, ignoring offset and limit
    fn count_entities(&self, query: &QuerySpecification) -> Result<usize, EntityStoreError> {
        let mut all = query.clone();
        all.offset = None;
        all.limit = None;
        Ok(self.find_entities(&all)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::EntityReference;
    use serde_json::json;

    fn person(id: &str, name: &str, age: i64) -> EntityState {
        let mut state = IndexMap::new();
        state.insert("name".to_string(), json!(name));
        state.insert("age".to_string(), json!(age));
        EntityState::new(EntityReference::new(id), "Person".into(), state)
    }

    #[test]
    fn test_filters_and_variables() {
        let mut query = QuerySpecification {
            result_types: vec!["Person".into()],
            ..Default::default()
        };
        query
            .filters
            .insert("name".to_string(), QueryFilter::Variable("who".to_string()));
        assert!(!query.matches(&person("1", "Ann", 30)));

        query.variables.insert("who".to_string(), json!("Ann"));
        assert!(query.matches(&person("1", "Ann", 30)));
        assert!(!query.matches(&person("2", "Bob", 30)));

        let mut pet = person("3", "Ann", 2);
        pet.entity_type = "Pet".into();
        assert!(!query.matches(&pet));
    }

    #[test]
    fn test_window_sorts_then_pages() {
        let states = [person("1", "a", 30), person("2", "b", 20), person("3", "c", 40)];
        let query = QuerySpecification {
            sort_by: Some(("age".to_string(), SortDirection::Descending)),
            offset: Some(1),
            limit: Some(1),
            ..Default::default()
        };
        let window = query.window(states.iter().collect());
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].reference.identity(), "1");
    }
}
