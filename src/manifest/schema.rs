//! Cognitive Manifest：THINK 阶段产出的结构化回合计划
//!
//! 只能经由 sanitize_manifest 构造；intent 恒在封闭集合内，narrative 恒非空。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 意图（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ThemeChange,
    MemoryRecall,
    Combat,
    Dialogue,
    Exploration,
    Inventory,
    Smalltalk,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Intent::ThemeChange,
        Intent::MemoryRecall,
        Intent::Combat,
        Intent::Dialogue,
        Intent::Exploration,
        Intent::Inventory,
        Intent::Smalltalk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ThemeChange => "theme_change",
            Intent::MemoryRecall => "memory_recall",
            Intent::Combat => "combat",
            Intent::Dialogue => "dialogue",
            Intent::Exploration => "exploration",
            Intent::Inventory => "inventory",
            Intent::Smalltalk => "smalltalk",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = ();

    /// 精确匹配，不做大小写折叠
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL.into_iter().find(|i| i.as_str() == s).ok_or(())
    }
}

/// delta 动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaAction {
    Add,
    Remove,
    Update,
}

impl DeltaAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaAction::Add => "add",
            DeltaAction::Remove => "remove",
            DeltaAction::Update => "update",
        }
    }
}

impl FromStr for DeltaAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(DeltaAction::Add),
            "remove" => Ok(DeltaAction::Remove),
            "update" => Ok(DeltaAction::Update),
            _ => Err(()),
        }
    }
}

/// 叙述人称；未知 style 在叙述时退回第二人称
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationStyle {
    SecondPerson,
    FirstPerson,
    ThirdPerson,
}

impl NarrationStyle {
    pub fn from_token(token: &str) -> Self {
        match token {
            "first_person" => NarrationStyle::FirstPerson,
            "third_person" => NarrationStyle::ThirdPerson,
            _ => NarrationStyle::SecondPerson,
        }
    }
}

/// 一次工具调用（名称已在工具目录中）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: serde_json::Map<String, serde_json::Value>,
}

/// 模型预测的一次状态变化
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaPrediction {
    /// 如 "inventory"、"npc_sentiment"、"scene"
    pub entity_type: String,
    /// 如 "dagger"、"marta"、"tavern_entrance"
    pub entity_id: String,
    pub action: DeltaAction,
    /// JSON 编码的值或普通字符串
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarrationDirective {
    pub tone: String,
    /// 原始 style 标记，叙述时经 NarrationStyle::from_token 解释
    pub style: String,
    pub sentences: u32,
    pub must_reference: Vec<String>,
    pub must_avoid: Vec<String>,
}

pub const DEFAULT_TONE: &str = "neutral";
pub const DEFAULT_STYLE: &str = "second_person";
pub const DEFAULT_SENTENCES: u32 = 3;

impl Default for NarrationDirective {
    fn default() -> Self {
        Self {
            tone: DEFAULT_TONE.to_string(),
            style: DEFAULT_STYLE.to_string(),
            sentences: DEFAULT_SENTENCES,
            must_reference: Vec::new(),
            must_avoid: Vec::new(),
        }
    }
}

impl NarrationDirective {
    pub fn pov(&self) -> NarrationStyle {
        NarrationStyle::from_token(&self.style)
    }
}

/// 本回合的已校验计划
#[derive(Debug, Clone, PartialEq)]
pub struct CognitiveManifest {
    pub intent: Intent,
    pub narrative: String,
    pub rag_queries: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
    pub state_deltas: Vec<DeltaPrediction>,
    pub narration_directive: NarrationDirective,
}

impl CognitiveManifest {
    /// THINK 重试耗尽后的兜底计划：smalltalk + 致歉 + 回显用户输入
    pub fn fallback(user_input: &str) -> Self {
        Self {
            intent: Intent::Smalltalk,
            narrative: format!(
                "I may have missed your intent. Please rephrase or be more specific. Your message was: {}",
                user_input
            ),
            rag_queries: Vec::new(),
            tool_calls: Vec::new(),
            state_deltas: Vec::new(),
            narration_directive: NarrationDirective {
                tone: "apologetic".to_string(),
                sentences: 2,
                ..NarrationDirective::default()
            },
        }
    }
}
