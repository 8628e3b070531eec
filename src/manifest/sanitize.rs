//! Manifest 校验与清洗
//!
//! 模型是不可信的结构化数据作者：可选字段逐项容错（丢弃 / 默认 / 强制转换），
//! 只有 intent 或 narrative 不可用时才整体拒绝。

use serde_json::{Map, Value};
use thiserror::Error;

use crate::manifest::{
    CognitiveManifest, DeltaAction, DeltaPrediction, Intent, NarrationDirective, ToolCall,
    DEFAULT_SENTENCES, DEFAULT_STYLE, DEFAULT_TONE,
};
use crate::tools::ToolCatalog;

/// 整体拒绝的原因（仅用于日志，不会传给回合调用方）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestRejection {
    #[error("no JSON value could be extracted")]
    NoValue,
    #[error("manifest is not a JSON object")]
    NotAnObject,
    #[error("intent missing or not a known intent: {0}")]
    InvalidIntent(String),
    #[error("narrative missing, not text, or empty")]
    InvalidNarrative,
}

/// 清洗时用到的上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestLimits {
    pub rag_query_limit: usize,
    pub max_sentences: u32,
}

impl Default for ManifestLimits {
    fn default() -> Self {
        Self {
            rag_query_limit: 3,
            max_sentences: 5,
        }
    }
}

/// 将解码后的 JSON 转为 CognitiveManifest；value 为 None 表示提取失败
pub fn sanitize_manifest(
    value: Option<&Value>,
    limits: &ManifestLimits,
    catalog: &ToolCatalog,
) -> Result<CognitiveManifest, ManifestRejection> {
    let data = value
        .ok_or(ManifestRejection::NoValue)?
        .as_object()
        .ok_or(ManifestRejection::NotAnObject)?;

    let intent = match data.get("intent") {
        Some(Value::String(s)) => s
            .parse::<Intent>()
            .map_err(|_| ManifestRejection::InvalidIntent(s.clone()))?,
        Some(other) => return Err(ManifestRejection::InvalidIntent(other.to_string())),
        None => return Err(ManifestRejection::InvalidIntent("(missing)".to_string())),
    };

    let narrative = match data.get("narrative") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(ManifestRejection::InvalidNarrative),
    };

    let mut rag_queries = string_list(data.get("rag_queries"));
    rag_queries.truncate(limits.rag_query_limit);

    let manifest = CognitiveManifest {
        intent,
        narrative,
        rag_queries,
        tool_calls: tool_calls(data.get("tool_calls"), catalog),
        state_deltas: state_deltas(data.get("state_deltas")),
        narration_directive: directive(data.get("narration_directive"), limits.max_sentences),
    };
    Ok(manifest)
}

fn as_list(v: Option<&Value>) -> &[Value] {
    match v {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

/// 只保留字符串元素；非列表视为空
fn string_list(v: Option<&Value>) -> Vec<String> {
    as_list(v)
        .iter()
        .filter_map(|item| item.as_str().map(String::from))
        .collect()
}

/// 文本强制转换：字符串原样，数字 / 布尔取显示形式，对象 / 数组取紧凑 JSON，null 或缺失取默认
fn coerce_text(v: Option<&Value>, default: &str) -> String {
    match v {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// 整数强制转换：整数、浮点（截断）、数字字符串；其他返回 None
fn coerce_int(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

fn tool_calls(v: Option<&Value>, catalog: &ToolCatalog) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    for item in as_list(v) {
        let Some(entry) = item.as_object() else {
            continue;
        };
        let name = match entry.get("name").and_then(Value::as_str) {
            Some(n) if catalog.contains(n) => n.to_string(),
            other => {
                tracing::debug!(tool = ?other, "dropping tool call not in catalog");
                continue;
            }
        };
        let args = match entry.get("args") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        calls.push(ToolCall { name, args });
    }
    calls
}

fn state_deltas(v: Option<&Value>) -> Vec<DeltaPrediction> {
    let mut deltas = Vec::new();
    for item in as_list(v) {
        let Some(entry) = item.as_object() else {
            continue;
        };
        let action = match entry.get("action").and_then(Value::as_str).map(str::parse::<DeltaAction>) {
            Some(Ok(a)) => a,
            _ => {
                tracing::debug!(delta = %item, "dropping state delta with invalid action");
                continue;
            }
        };
        deltas.push(DeltaPrediction {
            entity_type: coerce_text(entry.get("entity_type"), ""),
            entity_id: coerce_text(entry.get("entity_id"), ""),
            action,
            value: coerce_text(entry.get("value"), ""),
        });
    }
    deltas
}

fn directive(v: Option<&Value>, max_sentences: u32) -> NarrationDirective {
    let Some(raw) = v.and_then(Value::as_object) else {
        return NarrationDirective {
            sentences: DEFAULT_SENTENCES.clamp(1, max_sentences.max(1)),
            ..NarrationDirective::default()
        };
    };
    let sentences = coerce_int(raw.get("sentences"))
        .unwrap_or(i64::from(DEFAULT_SENTENCES))
        .clamp(1, i64::from(max_sentences.max(1))) as u32;
    NarrationDirective {
        tone: coerce_text(raw.get("tone"), DEFAULT_TONE),
        style: coerce_text(raw.get("style"), DEFAULT_STYLE),
        sentences,
        must_reference: string_list(raw.get("must_reference")),
        must_avoid: string_list(raw.get("must_avoid")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sanitize(v: Value) -> Result<CognitiveManifest, ManifestRejection> {
        sanitize_manifest(Some(&v), &ManifestLimits::default(), &ToolCatalog::builtin())
    }

    #[test]
    fn test_rejects_missing_or_unknown_intent() {
        assert_eq!(
            sanitize(json!({"narrative": "x"})).unwrap_err(),
            ManifestRejection::InvalidIntent("(missing)".into())
        );
        assert!(matches!(
            sanitize(json!({"intent": "dance", "narrative": "x"})),
            Err(ManifestRejection::InvalidIntent(_))
        ));
        assert!(matches!(
            sanitize(json!({"intent": 3, "narrative": "x"})),
            Err(ManifestRejection::InvalidIntent(_))
        ));
    }

    #[test]
    fn test_rejects_bad_narrative_and_non_objects() {
        assert_eq!(
            sanitize(json!({"intent": "combat", "narrative": ""})).unwrap_err(),
            ManifestRejection::InvalidNarrative
        );
        assert_eq!(
            sanitize(json!({"intent": "combat", "narrative": 42})).unwrap_err(),
            ManifestRejection::InvalidNarrative
        );
        assert_eq!(sanitize(json!(["combat"])).unwrap_err(), ManifestRejection::NotAnObject);
        assert_eq!(
            sanitize_manifest(None, &ManifestLimits::default(), &ToolCatalog::builtin()).unwrap_err(),
            ManifestRejection::NoValue
        );
    }

    #[test]
    fn test_malformed_optional_fields_default_to_empty() {
        let m = sanitize(json!({
            "intent": "exploration",
            "narrative": "You step inside.",
            "rag_queries": "tavern",
            "tool_calls": {"name": "apply_bespoke_theme"},
            "state_deltas": 7,
            "narration_directive": "dramatic"
        }))
        .unwrap();
        assert!(m.rag_queries.is_empty());
        assert!(m.tool_calls.is_empty());
        assert!(m.state_deltas.is_empty());
        assert_eq!(m.narration_directive, NarrationDirective::default());
    }

    #[test]
    fn test_rag_queries_filtered_and_truncated() {
        let m = sanitize(json!({
            "intent": "memory_recall",
            "narrative": "You remember.",
            "rag_queries": ["a", 1, null, "b", "c", "d"]
        }))
        .unwrap();
        assert_eq!(m.rag_queries, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_tool_calls_keep_only_catalog_names() {
        let m = sanitize(json!({
            "intent": "theme_change",
            "narrative": "The world shifts color.",
            "tool_calls": [
                {"name": "launch_missiles", "args": {}},
                {"name": "apply_bespoke_theme", "args": "red"},
                "apply_bespoke_theme",
                {"args": {}},
                {"name": "apply_bespoke_theme", "args": {"accent": "#ff0000"}}
            ]
        }))
        .unwrap();
        assert_eq!(m.tool_calls.len(), 2);
        assert!(m.tool_calls[0].args.is_empty());
        assert_eq!(m.tool_calls[1].args["accent"], "#ff0000");
    }

    #[test]
    fn test_state_deltas_drop_invalid_actions_and_coerce_text() {
        let m = sanitize(json!({
            "intent": "inventory",
            "narrative": "You pocket the coins.",
            "state_deltas": [
                {"entity_type": "inventory", "entity_id": "coins", "action": "add", "value": 12},
                {"entity_type": "inventory", "entity_id": "coins", "action": "steal"},
                {"entity_id": "map", "action": "update", "value": {"marked": true}},
                ["not", "a", "map"]
            ]
        }))
        .unwrap();
        assert_eq!(m.state_deltas.len(), 2);
        assert_eq!(m.state_deltas[0].value, "12");
        assert_eq!(m.state_deltas[1].entity_type, "");
        assert_eq!(m.state_deltas[1].action, DeltaAction::Update);
        assert_eq!(m.state_deltas[1].value, r#"{"marked":true}"#);
    }

    #[test]
    fn test_directive_coercion_and_clamp() {
        let m = sanitize(json!({
            "intent": "dialogue",
            "narrative": "Marta nods.",
            "narration_directive": {
                "tone": "warm",
                "style": "third_person",
                "sentences": "9",
                "must_reference": ["Marta", 3, "ale"],
                "must_avoid": "dragons"
            }
        }))
        .unwrap();
        let d = &m.narration_directive;
        assert_eq!(d.tone, "warm");
        assert_eq!(d.style, "third_person");
        assert_eq!(d.sentences, 5);
        assert_eq!(d.must_reference, vec!["Marta", "ale"]);
        assert!(d.must_avoid.is_empty());
    }

    #[test]
    fn test_sentences_non_numeric_uses_default() {
        let m = sanitize(json!({
            "intent": "smalltalk",
            "narrative": "Hi.",
            "narration_directive": {"sentences": "many", "tone": null}
        }))
        .unwrap();
        assert_eq!(m.narration_directive.sentences, 3);
        assert_eq!(m.narration_directive.tone, "neutral");
        let m = sanitize(json!({
            "intent": "smalltalk",
            "narrative": "Hi.",
            "narration_directive": {"sentences": 2.8}
        }))
        .unwrap();
        assert_eq!(m.narration_directive.sentences, 2);
    }

    #[test]
    fn test_sentences_zero_or_negative_clamp_to_one() {
        for raw in [json!(0), json!(-3), json!("0"), json!("-12"), json!(-0.5)] {
            let m = sanitize(json!({
                "intent": "smalltalk",
                "narrative": "Hi.",
                "narration_directive": {"sentences": raw.clone()}
            }))
            .unwrap();
            assert_eq!(m.narration_directive.sentences, 1, "sentences = {raw}");
        }
    }
}
