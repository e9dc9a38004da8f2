//! Operation lookup.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Operations pre-sorted by template specificity, so the first hit wins
//! - Explicit `None` rather than a silent default

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use serde_json::Value;

use crate::routing::operation::{Operation, PATH_ITEM_METHODS};

/// All operations of one normalized document.
#[derive(Debug, Default)]
pub struct OperationTable {
    by_method: HashMap<Method, Vec<Arc<Operation>>>,
}

impl OperationTable {
    /// Build the table from a normalized (v3, dereferenced) document.
    pub fn from_document(doc: &Value) -> Self {
        let mut by_method: HashMap<Method, Vec<Arc<Operation>>> = HashMap::new();

        let paths = doc.get("paths").and_then(Value::as_object);
        for (path, item) in paths.into_iter().flatten() {
            for method in PATH_ITEM_METHODS {
                let Some(op) = item.get(method) else { continue };
                match Operation::from_document(path, method, item, op) {
                    Some(operation) => by_method
                        .entry(operation.method.clone())
                        .or_default()
                        .push(Arc::new(operation)),
                    None => tracing::warn!(path = %path, method, "Skipping unparseable operation"),
                }
            }
        }

        // Stable sort keeps document order among equally specific templates.
        for ops in by_method.values_mut() {
            ops.sort_by(|a, b| a.template.specificity_cmp(&b.template));
        }

        Self { by_method }
    }

    /// Map (method, path) to a declared operation.
    pub fn match_operation(&self, method: &Method, path: &str) -> Option<Arc<Operation>> {
        let method = Method::from_bytes(method.as_str().to_ascii_uppercase().as_bytes()).ok()?;
        self.by_method
            .get(&method)?
            .iter()
            .find(|op| op.template.matches(path))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.by_method.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn operations(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.by_method.values().flatten()
    }
}

/// Named segment values of `path` under the operation's template.
pub fn path_params(operation: &Operation, path: &str) -> HashMap<String, String> {
    operation.template.captures(path).unwrap_or_default()
}
