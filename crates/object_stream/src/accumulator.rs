use serde_json::{Map, Value};

use crate::error::ApplyError;
use crate::ops::Operation;

/// Folds ordered operation batches into an evolving JSON document.
///
/// The accumulator is driven synchronously, once per received batch, by the
/// decoder loop. It exposes whole, consistent snapshots only; a failing
/// operation is terminal for the stream.
#[derive(Debug)]
pub struct ObjectStreamAccumulator {
    state: Value,
}

impl Default for ObjectStreamAccumulator {
    fn default() -> Self {
        Self {
            state: Value::Object(Map::new()),
        }
    }
}

impl ObjectStreamAccumulator {
    /// Applies each operation in order and returns the new snapshot.
    pub fn append(&mut self, operations: &[Operation]) -> Result<&Value, ApplyError> {
        for operation in operations {
            self.apply(operation)?;
        }

        Ok(&self.state)
    }

    /// Current fully-applied document.
    #[must_use]
    pub fn snapshot(&self) -> &Value {
        &self.state
    }

    fn apply(&mut self, operation: &Operation) -> Result<(), ApplyError> {
        match operation {
            Operation::Set { path, value } => self.set(path, value.clone()),
            Operation::AppendText { path, value } => {
                let target = resolve_mut(&mut self.state, path)?;
                match target {
                    Value::String(text) => {
                        text.push_str(value);
                        Ok(())
                    }
                    found => Err(ApplyError::TargetNotString {
                        path: display_path(path),
                        found: value_type_name(found),
                    }),
                }
            }
            Operation::AppendItem { path, value } => {
                let target = resolve_mut(&mut self.state, path)?;
                match target {
                    Value::Array(items) => {
                        items.push(value.clone());
                        Ok(())
                    }
                    found => Err(ApplyError::TargetNotArray {
                        path: display_path(path),
                        found: value_type_name(found),
                    }),
                }
            }
        }
    }

    fn set(&mut self, path: &[String], value: Value) -> Result<(), ApplyError> {
        let Some((last, parents)) = path.split_last() else {
            self.state = value;
            return Ok(());
        };

        let mut current = &mut self.state;
        for segment in parents {
            current = match current {
                Value::Object(map) => map
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(items) => {
                    let index = parse_index(path, segment)?;
                    let len = items.len();
                    items
                        .get_mut(index)
                        .ok_or_else(|| ApplyError::IndexOutOfBounds {
                            path: display_path(path),
                            index,
                            len,
                        })?
                }
                found => {
                    return Err(ApplyError::PathThroughNonContainer {
                        path: display_path(path),
                        segment: segment.clone(),
                        found: value_type_name(found),
                    })
                }
            };
        }

        match current {
            Value::Object(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            Value::Array(items) => {
                let index = parse_index(path, last)?;
                let len = items.len();
                if index < len {
                    items[index] = value;
                    Ok(())
                } else if index == len {
                    // Setting index == len is the wire form of a list append.
                    items.push(value);
                    Ok(())
                } else {
                    Err(ApplyError::IndexOutOfBounds {
                        path: display_path(path),
                        index,
                        len,
                    })
                }
            }
            found => Err(ApplyError::PathThroughNonContainer {
                path: display_path(path),
                segment: last.clone(),
                found: value_type_name(found),
            }),
        }
    }
}

fn resolve_mut<'doc>(
    document: &'doc mut Value,
    path: &[String],
) -> Result<&'doc mut Value, ApplyError> {
    let mut current = document;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get_mut(segment).ok_or_else(|| ApplyError::MissingTarget {
                path: display_path(path),
            })?,
            Value::Array(items) => {
                let index = parse_index(path, segment)?;
                let len = items.len();
                items
                    .get_mut(index)
                    .ok_or_else(|| ApplyError::IndexOutOfBounds {
                        path: display_path(path),
                        index,
                        len,
                    })?
            }
            found => {
                return Err(ApplyError::PathThroughNonContainer {
                    path: display_path(path),
                    segment: segment.clone(),
                    found: value_type_name(found),
                })
            }
        };
    }

    Ok(current)
}

fn parse_index(path: &[String], segment: &str) -> Result<usize, ApplyError> {
    segment.parse().map_err(|_| ApplyError::InvalidIndex {
        path: display_path(path),
        segment: segment.to_string(),
    })
}

fn display_path(path: &[String]) -> String {
    path.join(".")
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
