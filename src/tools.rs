//! The static tool table exposed through `tools/list` and `tools/call`.

use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde_json::{Number, Value, json};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("missing required argument '{0}'")]
    MissingArgument(&'static str),
    #[error("argument '{0}' must be a number")]
    NotANumber(&'static str),
    #[error("result of '{0}' is not a finite number")]
    NonFinite(&'static str),
}

/// A tool implementation: validated arguments in, tool result out.
pub type ToolFn = fn(&JsonObject) -> Result<CallToolResult, ToolError>;

struct ToolEntry {
    descriptor: Tool,
    call: ToolFn,
}

/// Immutable set of tools, fixed at construction.
pub struct ToolTable {
    entries: Vec<ToolEntry>,
}

impl std::fmt::Debug for ToolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.descriptor.name))
            .finish()
    }
}

impl Default for ToolTable {
    fn default() -> Self {
        Self::arithmetic()
    }
}

impl ToolTable {
    /// A table serving `tools` in the given order.
    pub fn new(tools: Vec<(Tool, ToolFn)>) -> Self {
        Self {
            entries: tools
                .into_iter()
                .map(|(descriptor, call)| ToolEntry { descriptor, call })
                .collect(),
        }
    }

    /// The `add` and `multiply` tools.
    pub fn arithmetic() -> Self {
        Self {
            entries: vec![
                ToolEntry {
                    descriptor: Tool::new(
                        "add",
                        "Add two numbers together",
                        number_pair_schema(("a", "First number to add"), ("b", "Second number to add")),
                    ),
                    call: add,
                },
                ToolEntry {
                    descriptor: Tool::new(
                        "multiply",
                        "Multiply two numbers together",
                        number_pair_schema(
                            ("x", "First number to multiply"),
                            ("y", "Second number to multiply"),
                        ),
                    ),
                    call: multiply,
                },
            ],
        }
    }

    pub fn descriptors(&self) -> Vec<Tool> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn call(&self, name: &str, arguments: &JsonObject) -> Result<CallToolResult, ToolError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        (entry.call)(arguments)
    }
}

fn number_pair_schema(first: (&str, &str), second: (&str, &str)) -> Arc<JsonObject> {
    let mut properties = JsonObject::new();
    for (name, description) in [first, second] {
        properties.insert(
            name.to_string(),
            json!({ "type": "number", "description": description }),
        );
    }

    let mut schema = JsonObject::new();
    schema.insert("type".into(), "object".into());
    schema.insert("properties".into(), Value::Object(properties));
    schema.insert("required".into(), json!([first.0, second.0]));
    Arc::new(schema)
}

fn add(arguments: &JsonObject) -> Result<CallToolResult, ToolError> {
    let a = number_arg(arguments, "a")?;
    let b = number_arg(arguments, "b")?;
    let sum = combine(a, b, i128::checked_add, |x, y| x + y, "add")?;
    Ok(text_result(format!("{a} + {b} = {sum}")))
}

fn multiply(arguments: &JsonObject) -> Result<CallToolResult, ToolError> {
    let x = number_arg(arguments, "x")?;
    let y = number_arg(arguments, "y")?;
    let product = combine(x, y, i128::checked_mul, |p, q| p * q, "multiply")?;
    Ok(text_result(format!("{x} × {y} = {product}")))
}

fn number_arg<'a>(arguments: &'a JsonObject, name: &'static str) -> Result<&'a Number, ToolError> {
    match arguments.get(name) {
        None | Some(Value::Null) => Err(ToolError::MissingArgument(name)),
        Some(Value::Number(n)) => Ok(n),
        Some(_) => Err(ToolError::NotANumber(name)),
    }
}

/// Exact integer arithmetic while both operands are integers and the result
/// fits in an `i128`, floating point otherwise. The result is returned already
/// formatted, since exact integers may exceed what a JSON number holds.
fn combine(
    lhs: &Number,
    rhs: &Number,
    int_op: fn(i128, i128) -> Option<i128>,
    float_op: fn(f64, f64) -> f64,
    tool: &'static str,
) -> Result<String, ToolError> {
    if let (Some(l), Some(r)) = (as_integer(lhs), as_integer(rhs))
        && let Some(v) = int_op(l, r)
    {
        return Ok(v.to_string());
    }
    let (Some(l), Some(r)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(ToolError::NonFinite(tool));
    };
    Number::from_f64(float_op(l, r))
        .map(|n| n.to_string())
        .ok_or(ToolError::NonFinite(tool))
}

fn as_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}
