//! apply_bespoke_theme：运行时切换终端配色与用户消息对齐方式
//!
//! 主题存放在 ThemeHandle（Arc<RwLock<Theme>>）中，由 REPL 读取并用 crossterm 上色。

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use crossterm::style::Color;
use serde_json::{json, Map, Value};

use crate::tools::{Tool, ToolError};

pub const TOOL_NAME: &str = "apply_bespoke_theme";
pub const TOOL_DESCRIPTION: &str = "Apply a runtime UI theme (colors + alignment).";

/// 示例参数（同时也是各字段的默认值）
pub fn example_args() -> Value {
    json!({
        "surface": "#1e1e1e",
        "surface_light": "#2a2a2a",
        "text": "#e6e6e6",
        "accent": "#f7b32b",
        "user_align": "right",
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub surface: Color,
    pub surface_light: Color,
    /// 叙述文本颜色
    pub text: Color,
    /// 用户输入回显颜色
    pub accent: Color,
    pub user_align: Align,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface: Color::Rgb { r: 0x1e, g: 0x1e, b: 0x1e },
            surface_light: Color::Rgb { r: 0x2a, g: 0x2a, b: 0x2a },
            text: Color::Rgb { r: 0xe6, g: 0xe6, b: 0xe6 },
            accent: Color::Rgb { r: 0xf7, g: 0xb3, b: 0x2b },
            user_align: Align::Right,
        }
    }
}

pub type ThemeHandle = Arc<RwLock<Theme>>;

/// "#rrggbb" 或 "rrggbb" → Color::Rgb
pub fn parse_hex_color(s: &str) -> Option<Color> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

pub struct ApplyBespokeThemeTool {
    theme: ThemeHandle,
}

impl ApplyBespokeThemeTool {
    pub fn new(theme: ThemeHandle) -> Self {
        Self { theme }
    }
}

fn color_arg(args: &Map<String, Value>, key: &str, default: Color) -> Result<Color, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(s)) => {
            parse_hex_color(s).ok_or_else(|| ToolError::InvalidArgs(format!("{key}: not a hex color: {s}")))
        }
        Some(other) => Err(ToolError::InvalidArgs(format!("{key}: expected string, got {other}"))),
    }
}

#[async_trait]
impl Tool for ApplyBespokeThemeTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        TOOL_DESCRIPTION
    }

    fn example_args(&self) -> Value {
        example_args()
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let defaults = Theme::default();
        let user_align = match args.get("user_align").and_then(Value::as_str) {
            None => defaults.user_align,
            Some("right") => Align::Right,
            Some("left") => Align::Left,
            Some(other) => return Err(ToolError::InvalidArgs(format!("user_align: {other}"))),
        };
        let theme = Theme {
            surface: color_arg(args, "surface", defaults.surface)?,
            surface_light: color_arg(args, "surface_light", defaults.surface_light)?,
            text: color_arg(args, "text", defaults.text)?,
            accent: color_arg(args, "accent", defaults.accent)?,
            user_align,
        };
        let mut guard = self
            .theme
            .write()
            .map_err(|_| ToolError::Failed("theme lock poisoned".to_string()))?;
        *guard = theme;
        tracing::info!(?theme, "theme applied");
        Ok(json!({"status": "applied"}))
    }
}
