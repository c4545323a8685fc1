//! Tool registry
//!
//! Tool handlers are registered once at startup and invoked by name. Each
//! invocation is timed and reported to the [`AuditSink`].

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use logrelay_common::error::StructuredError;
use logrelay_common::observability::{AuditSink, NoOpAudit, ToolExecution};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::api::CallContext;

/// Argument keys naming the resource a call touches
const RESOURCE_KEYS: [&str; 3] = ["id", "query_id", "name"];

/// Executes one tool call
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: CallContext, args: Value) -> Result<Value, StructuredError>;
}

/// Adapter turning an async closure into a [`ToolHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(CallContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, StructuredError>> + Send,
{
    async fn call(&self, ctx: CallContext, args: Value) -> Result<Value, StructuredError> {
        (self.0)(ctx, args).await
    }
}

/// Registered tool
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON schema of the accepted arguments
    pub input_schema: Value,
    /// Operation label for audit records, e.g. `read` or `write`
    pub operation: String,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            operation: "invoke".to_string(),
            handler,
        }
    }

    /// Tool backed by an async closure
    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StructuredError>> + Send + 'static,
    {
        Self::new(name, description, input_schema, Arc::new(FnHandler(handler)))
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Serializable listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Name-indexed tool set
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Tool>>,
    audit: Arc<dyn AuditSink>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish_non_exhaustive()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(Arc::new(NoOpAudit))
    }
}

impl ToolRegistry {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self { tools: RwLock::new(BTreeMap::new()), audit }
    }

    /// # Errors
    ///
    /// `Conflict` when a tool with the same name exists.
    pub fn register(&self, tool: Tool) -> Result<(), StructuredError> {
        let mut tools = self.tools.write();
        if tools.contains_key(&tool.name) {
            return Err(StructuredError::conflict(format!("tool {} is already registered", tool.name)));
        }
        debug!(tool = %tool.name, "registered tool");
        tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Registered tools sorted by name
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools.read().values().map(Tool::descriptor).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Run the tool called `name`
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` for unknown tools, otherwise the handler's error.
    #[instrument(skip(self, ctx, args))]
    pub async fn invoke(
        &self,
        name: &str,
        ctx: &CallContext,
        args: Value,
    ) -> Result<Value, StructuredError> {
        let started = Instant::now();
        let resource = resource_of(&args);
        let tool = self.tools.read().get(name).cloned();

        let (operation, result) = match tool {
            Some(tool) => {
                let ctx = ctx.child().with_operation(tool.name.clone());
                (tool.operation.clone(), tool.handler.call(ctx, args).await)
            }
            None => (
                "invoke".to_string(),
                Err(StructuredError::not_found(format!("unknown tool: {name}"))),
            ),
        };

        if self.audit.is_enabled() {
            let mut record = ToolExecution::new(name, operation).with_duration(started.elapsed());
            if let Some(resource) = resource {
                record = record.with_resource(resource);
            }
            if let Err(err) = &result {
                record = record.failed(err.to_string());
            }
            self.audit.log_tool_execution(record);
        }

        result
    }
}

fn resource_of(args: &Value) -> Option<String> {
    RESOURCE_KEYS.iter().find_map(|key| match args.get(*key)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    })
}
