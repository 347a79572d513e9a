//! Function registry: name lookup, argument validation, and dispatch.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use anyhow::{Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{Capability, DispatchError, ToolOutput};
use crate::core::message::FunctionCall;
use crate::provider::FunctionSchema;

struct Entry {
    capability: Box<dyn Capability>,
    validator: Validator,
}

/// Capabilities keyed by name, kept in registration order.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. Its parameter schema is compiled up front;
    /// names must be unique.
    pub fn register(&mut self, capability: impl Capability + 'static) -> Result<()> {
        let name = capability.name().to_string();
        if self.index.contains_key(&name) {
            return Err(anyhow!("capability '{name}' registered twice"));
        }
        let validator = validator_for(&capability.parameters())
            .map_err(|err| anyhow!("invalid parameter schema for '{name}': {err}"))?;
        self.index.insert(name, self.entries.len());
        self.entries.push(Entry {
            capability: Box::new(capability),
            validator,
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.capability.name()).collect()
    }

    /// Schemas advertised to the model, in registration order.
    pub fn schemas(&self) -> Vec<FunctionSchema> {
        self.entries.iter().map(|e| e.capability.schema()).collect()
    }

    /// Run `call` and return its text result.
    ///
    /// Never fails: every error comes back as a `❌ <kind>: <detail>` string.
    #[instrument(skip_all, fields(function = %call.name))]
    pub fn dispatch(&self, call: &FunctionCall) -> String {
        match self.try_dispatch(call) {
            Ok(output) => {
                debug!("dispatch succeeded");
                output.into_text()
            }
            Err(err) => {
                warn!(kind = err.kind(), err = %err, "dispatch failed");
                err.tagged()
            }
        }
    }

    /// Typed form of [`dispatch`](Self::dispatch).
    pub fn try_dispatch(&self, call: &FunctionCall) -> Result<ToolOutput, DispatchError> {
        let entry = self
            .index
            .get(&call.name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| DispatchError::UnknownFunction(call.name.clone()))?;

        let args = call
            .arguments
            .normalize()
            .map_err(DispatchError::InvalidArguments)?;

        let instance = Value::Object(args.clone());
        if !entry.validator.is_valid(&instance) {
            let messages = entry
                .validator
                .iter_errors(&instance)
                .map(|err| err.to_string())
                .collect::<Vec<_>>();
            return Err(DispatchError::HandlerArgumentError(messages.join("; ")));
        }

        match catch_unwind(AssertUnwindSafe(|| entry.capability.execute(&args))) {
            Ok(result) => result,
            Err(_) => Err(DispatchError::HandlerExecutionError(format!(
                "handler '{}' panicked",
                call.name
            ))),
        }
    }
}
