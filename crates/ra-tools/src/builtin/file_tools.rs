//! File/memory I/O research tools — thin [`ToolExecutor`] wrappers around
//! [`crate::file_ops`], scoped to the calling agent's per-job workspace
//! directory.

use ra_domain::error::{Error, Result};
use ra_domain::tool::ToolDefinition;
use serde_json::Value;

use crate::file_ops;
use crate::registry::{ToolContext, ToolExecutor};

fn tool_error<T>(r: std::result::Result<T, String>) -> Result<T> {
    r.map_err(Error::ToolError)
}

pub fn read_definition() -> ToolDefinition {
    ToolDefinition {
        name: "file_read".into(),
        description: "Read a text file from the job workspace, optionally by line range.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "offset": {"type": "integer", "minimum": 0},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["path"]
        }),
        is_system_tool: false,
    }
}

pub struct FileReadExecutor;

#[async_trait::async_trait]
impl ToolExecutor for FileReadExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        let req: file_ops::FileReadRequest = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("file_read arguments: {e}")))?;
        let result = tool_error(file_ops::file_read(ctx.workspace_dir(), req).await)?;
        Ok(result.to_string())
    }
}

pub fn write_definition() -> ToolDefinition {
    ToolDefinition {
        name: "file_write".into(),
        description: "Write (overwrite) a text file in the job workspace.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        }),
        is_system_tool: false,
    }
}

pub struct FileWriteExecutor;

#[async_trait::async_trait]
impl ToolExecutor for FileWriteExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        let req: file_ops::FileWriteRequest = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("file_write arguments: {e}")))?;
        let result = tool_error(file_ops::file_write(ctx.workspace_dir(), req).await)?;
        Ok(result.to_string())
    }
}

pub fn append_definition() -> ToolDefinition {
    ToolDefinition {
        name: "file_append".into(),
        description: "Append text to a file in the job workspace, creating it if absent.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        }),
        is_system_tool: false,
    }
}

pub struct FileAppendExecutor;

#[async_trait::async_trait]
impl ToolExecutor for FileAppendExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        let req: file_ops::FileAppendRequest = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("file_append arguments: {e}")))?;
        let result = tool_error(file_ops::file_append(ctx.workspace_dir(), req).await)?;
        Ok(result.to_string())
    }
}

pub fn list_definition() -> ToolDefinition {
    ToolDefinition {
        name: "file_list".into(),
        description: "List entries in a job workspace directory (default: the workspace root).".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "default": "."}
            }
        }),
        is_system_tool: false,
    }
}

pub struct FileListExecutor;

#[async_trait::async_trait]
impl ToolExecutor for FileListExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        let req: file_ops::FileListRequest = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("file_list arguments: {e}")))?;
        let result = tool_error(file_ops::file_list(ctx.workspace_dir(), req).await)?;
        Ok(result.to_string())
    }
}

pub fn delete_definition() -> ToolDefinition {
    ToolDefinition {
        name: "file_delete".into(),
        description: "Delete a file in the job workspace.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"}
            },
            "required": ["path"]
        }),
        is_system_tool: false,
    }
}

pub struct FileDeleteExecutor;

#[async_trait::async_trait]
impl ToolExecutor for FileDeleteExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        let req: file_ops::FileDeleteRequest = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("file_delete arguments: {e}")))?;
        let result = tool_error(file_ops::file_delete(ctx.workspace_dir(), req).await)?;
        Ok(result.to_string())
    }
}

pub fn move_definition() -> ToolDefinition {
    ToolDefinition {
        name: "file_move".into(),
        description: "Move or rename a file within the job workspace.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "source": {"type": "string"},
                "destination": {"type": "string"}
            },
            "required": ["source", "destination"]
        }),
        is_system_tool: false,
    }
}

pub struct FileMoveExecutor;

#[async_trait::async_trait]
impl ToolExecutor for FileMoveExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        let req: file_ops::FileMoveRequest = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("file_move arguments: {e}")))?;
        let result = tool_error(file_ops::file_move(ctx.workspace_dir(), req).await)?;
        Ok(result.to_string())
    }
}
