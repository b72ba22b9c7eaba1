//! Field-level document patches.
//!
//! A [`Patch`] maps top-level field names to a [`FieldOp`]. Deletes and sets
//! in one patch are written together, as a single document update.

use crate::{Result, documents::Document};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldOp {
    Set(Value),
    Delete,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    ops: BTreeMap<String, FieldOp>,
}

impl Patch {
    pub fn builder() -> PatchBuilder {
        PatchBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldOp> {
        self.ops.get(field)
    }

    /// Fields written by this patch, as one JSON object.
    pub fn sets(&self) -> Map<String, Value> {
        self.ops
            .iter()
            .filter_map(|(k, op)| match op {
                FieldOp::Set(v) => Some((k.clone(), v.clone())),
                FieldOp::Delete => None,
            })
            .collect()
    }

    /// Fields removed by this patch.
    pub fn deletes(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter(|(_, op)| matches!(op, FieldOp::Delete))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn apply(&self, fields: &mut Map<String, Value>) {
        for (field, op) in &self.ops {
            match op {
                FieldOp::Set(v) => {
                    fields.insert(field.clone(), v.clone());
                }
                FieldOp::Delete => {
                    fields.remove(field);
                }
            }
        }
    }
}

/// Typed builder for [`Patch`]. A later operation on the same field replaces the earlier one.
#[derive(Debug, Default)]
pub struct PatchBuilder {
    ops: BTreeMap<String, FieldOp>,
}

impl PatchBuilder {
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.insert(field.into(), FieldOp::Set(value.into()));
        self
    }

    pub fn set_json<T: Serialize>(self, field: impl Into<String>, value: &T) -> Result<Self> {
        let v = serde_json::to_value(value)?;
        Ok(self.set(field, v))
    }

    pub fn set_if(self, field: impl Into<String>, value: Option<Value>) -> Self {
        match value {
            Some(v) => self.set(field, v),
            None => self,
        }
    }

    pub fn delete(mut self, field: impl Into<String>) -> Self {
        self.ops.insert(field.into(), FieldOp::Delete);
        self
    }

    /// Mark each listed field for deletion, but only the ones the document carries.
    pub fn delete_present(mut self, doc: &Document, fields: &[&str]) -> Self {
        for field in fields.iter().filter(|f| doc.has(f)) {
            self = self.delete(*field);
        }
        self
    }

    pub fn build(self) -> Patch {
        Patch { ops: self.ops }
    }
}
