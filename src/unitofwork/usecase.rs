// Copyright 2025 Cowboy AI, LLC.

use crate::meta_info::MetaInfo;
use std::any::Any;

/// Named purpose of a unit of work, carrying meta info for it
#[derive(Debug, Clone)]
pub struct Usecase {
    name: String,
    meta_info: MetaInfo,
}

impl Usecase {
    /// A usecase named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meta_info: MetaInfo::new(),
        }
    }

    /// Attach meta info, e.g. [`UnitOfWorkOptions`](crate::config::UnitOfWorkOptions)
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.meta_info.set(value);
        self
    }

    /// Usecase name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Meta info
    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }
}

impl Default for Usecase {
    fn default() -> Self {
        Self::new("default")
    }
}
