//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / example_args / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时加超时并把结果统一转为 ToolResult。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// 单个工具的失败；InvalidArgs 对外显示为固定的 "invalid_args"
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid_args")]
    InvalidArgs(String),
    #[error("{0}")]
    Failed(String),
}

/// 工具 trait：名称、描述（写进 THINK prompt）、示例参数、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 示例参数，原样渲染进工具目录
    fn example_args(&self) -> Value {
        Value::Object(Map::new())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// 已注册工具名，按字典序
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}
