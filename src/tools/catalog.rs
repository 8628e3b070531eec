//! 工具目录：THINK 可以提议的工具名 → (描述, 示例参数)
//!
//! 目录决定 manifest 中哪些 tool_calls 能通过校验；不在目录中的调用在到达执行器之前就被丢弃。

use serde_json::{json, Value};

use crate::tools::ToolRegistry;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub example_args: Value,
}

/// 有序工具目录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置目录：仅 apply_bespoke_theme
    pub fn builtin() -> Self {
        Self::new().with_entry(
            crate::tools::theme::TOOL_NAME,
            crate::tools::theme::TOOL_DESCRIPTION,
            crate::tools::theme::example_args(),
        )
    }

    /// 由注册表生成（按工具名排序）
    pub fn from_registry(registry: &ToolRegistry) -> Self {
        let mut catalog = Self::new();
        for name in registry.tool_names() {
            if let Some(tool) = registry.get(&name) {
                catalog = catalog.with_entry(&name, tool.description(), tool.example_args());
            }
        }
        catalog
    }

    /// 追加条目；同名条目被替换
    pub fn with_entry(mut self, name: &str, description: &str, example_args: Value) -> Self {
        let entry = CatalogEntry {
            name: name.to_string(),
            description: description.to_string(),
            example_args,
        };
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// THINK prompt 中的工具段落，每行 `  - name: desc args={json}`
    pub fn render_prompt_block(&self) -> String {
        if self.entries.is_empty() {
            return "  (none)".to_string();
        }
        self.entries
            .iter()
            .map(|e| format!("  - {}: {} args={}", e.name, e.description, compact(&e.example_args)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn compact(v: &Value) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| json!({}).to_string())
}
