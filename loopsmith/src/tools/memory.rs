//! Key/value memory capabilities backed by `kv.json`.

use serde_json::{Value, json};

use super::{Capability, DispatchError, ToolContext, ToolOutput, required_str};
use crate::core::message::ArgMap;
use crate::io::kv_store::KvStore;

pub struct SaveMemory {
    kv: KvStore,
}

impl SaveMemory {
    pub fn new(ctx: &ToolContext) -> Self {
        Self { kv: ctx.kv.clone() }
    }
}

impl Capability for SaveMemory {
    fn name(&self) -> &str {
        "save_memory"
    }

    fn description(&self) -> &str {
        "Persist a value under a key for later turns"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": {"type": "string"},
                "value": {"description": "Any JSON value"}
            },
            "required": ["key", "value"]
        })
    }

    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let key = required_str(args, "key")?;
        let value = args.get("value").cloned().unwrap_or(Value::Null);
        self.kv.save(key, value)?;
        Ok(ToolOutput::Text(format!("OK: saved '{key}'")))
    }
}

pub struct LoadMemory {
    kv: KvStore,
}

impl LoadMemory {
    pub fn new(ctx: &ToolContext) -> Self {
        Self { kv: ctx.kv.clone() }
    }
}

impl Capability for LoadMemory {
    fn name(&self) -> &str {
        "load_memory"
    }

    fn description(&self) -> &str {
        "Load the value stored under a key (null if absent)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"key": {"type": "string"}},
            "required": ["key"]
        })
    }

    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let key = required_str(args, "key")?;
        Ok(ToolOutput::Json(self.kv.get(key).unwrap_or(Value::Null)))
    }
}
