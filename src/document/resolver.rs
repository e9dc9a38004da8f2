//! Reference resolution capability.
//!
//! # Responsibilities
//! - Replace every `$ref` with its target (local pointers and relative files)
//! - Merge `allOf` compositions into a single schema
//! - Convert Swagger 2.0 documents to OpenAPI 3.0
//!
//! # Design Decisions
//! - Recursive references are cut at the point of recursion with a permissive
//!   `{}` schema; the document stays finite
//! - Resolution collects every failure instead of stopping at the first

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::document::convert::swagger2_to_openapi3;
use crate::document::error::DocumentError;
use crate::document::loader;

/// Converts legacy documents and dereferences references.
pub trait DocumentResolver: Send + Sync + std::fmt::Debug {
    /// Convert a Swagger 2.0 document to OpenAPI 3.0.
    fn convert_v2(&self, raw: &Value, source: &Path) -> Result<Value, DocumentError>;

    /// Dereference `$ref`s and merge `allOf`. `source` anchors relative file refs.
    fn resolve(&self, doc: Value, source: &Path) -> Result<Value, DocumentError>;
}

/// Default resolver working on the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct LocalResolver;

impl DocumentResolver for LocalResolver {
    fn convert_v2(&self, raw: &Value, _source: &Path) -> Result<Value, DocumentError> {
        swagger2_to_openapi3(raw)
    }

    fn resolve(&self, doc: Value, source: &Path) -> Result<Value, DocumentError> {
        let root = Arc::new(doc);
        let mut deref = Dereferencer {
            files: HashMap::from([(source.to_path_buf(), root.clone())]),
            unresolved: Vec::new(),
        };
        let ctx = Context {
            file: source.to_path_buf(),
            root: root.clone(),
        };
        let resolved = deref.walk(&root, &ctx, &mut Vec::new());

        if !deref.unresolved.is_empty() {
            return Err(DocumentError::ReferenceResolution {
                unresolved: deref.unresolved,
            });
        }
        Ok(merge_all_of(resolved))
    }
}

struct Context {
    file: PathBuf,
    root: Arc<Value>,
}

struct Dereferencer {
    files: HashMap<PathBuf, Arc<Value>>,
    unresolved: Vec<String>,
}

impl Dereferencer {
    fn walk(&mut self, node: &Value, ctx: &Context, stack: &mut Vec<String>) -> Value {
        match node {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    return self.follow(reference, node, ctx, stack);
                }
                Value::Object(map.iter().map(|(k, v)| (k.clone(), self.walk(v, ctx, stack))).collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.walk(v, ctx, stack)).collect()),
            scalar => scalar.clone(),
        }
    }

    fn follow(&mut self, reference: &str, node: &Value, ctx: &Context, stack: &mut Vec<String>) -> Value {
        let (file_part, pointer) = reference.split_once('#').unwrap_or((reference, ""));

        let target_file = if file_part.is_empty() {
            ctx.file.clone()
        } else {
            ctx.file.parent().unwrap_or(Path::new(".")).join(file_part)
        };

        let key = format!("{}#{}", target_file.display(), pointer);
        if stack.contains(&key) {
            tracing::debug!(reference, "Cutting recursive reference");
            return Value::Object(Map::new());
        }

        let Some(root) = self.root_of(&target_file, ctx) else {
            self.record(reference);
            return node.clone();
        };
        let Some(target) = root.pointer(pointer) else {
            self.record(reference);
            return node.clone();
        };

        let next = Context {
            file: target_file,
            root: root.clone(),
        };
        stack.push(key);
        let resolved = self.walk(target, &next, stack);
        stack.pop();
        resolved
    }

    fn root_of(&mut self, file: &Path, ctx: &Context) -> Option<Arc<Value>> {
        if file == ctx.file {
            return Some(ctx.root.clone());
        }
        if let Some(root) = self.files.get(file) {
            return Some(root.clone());
        }
        match loader::load(file) {
            Ok(doc) => {
                let doc = Arc::new(doc);
                self.files.insert(file.to_path_buf(), doc.clone());
                Some(doc)
            }
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "Referenced file could not be loaded");
                None
            }
        }
    }

    fn record(&mut self, reference: &str) {
        if !self.unresolved.iter().any(|r| r == reference) {
            self.unresolved.push(reference.to_string());
        }
    }
}

/// Fold `allOf` members into their parent, bottom-up.
pub fn merge_all_of(node: Value) -> Value {
    match node {
        Value::Object(map) => {
            let mut map: Map<String, Value> = map.into_iter().map(|(k, v)| (k, merge_all_of(v))).collect();

            let mergeable = matches!(map.get("allOf"), Some(Value::Array(items)) if items.iter().all(Value::is_object));
            if mergeable {
                if let Some(Value::Array(members)) = map.remove("allOf") {
                    for member in members {
                        if let Value::Object(member) = member {
                            merge_into(&mut map, member);
                        }
                    }
                }
            }
            Value::Object(map)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(merge_all_of).collect()),
        scalar => scalar,
    }
}

fn merge_into(target: &mut Map<String, Value>, member: Map<String, Value>) {
    for (key, value) in member {
        match target.get_mut(&key) {
            None => {
                target.insert(key, value);
            }
            Some(Value::Object(existing)) if key == "properties" => {
                if let Value::Object(incoming) = value {
                    for (name, schema) in incoming {
                        existing.entry(name).or_insert(schema);
                    }
                }
            }
            Some(Value::Array(existing)) if key == "required" => {
                if let Value::Array(incoming) = value {
                    for name in incoming {
                        if !existing.contains(&name) {
                            existing.push(name);
                        }
                    }
                }
            }
            // First member wins for every other keyword.
            Some(_) => {}
        }
    }
}
