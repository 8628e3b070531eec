//! 从模型的任意文本中尽力提取一个 JSON 值
//!
//! 依次尝试（先成功者胜）：整体解析 -> ``` 围栏内部 -> 流式解码首个值（忽略尾随文本）-> 首个 `{` 到末个 `}`。
//! 全部失败或输入为空时返回 None，不会 panic。

use serde_json::Value;

const FENCE: &str = "```";

pub fn extract_json(raw: &str) -> Option<Value> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(v) = serde_json::from_str::<Value>(cleaned) {
        return Some(v);
    }

    if let Some(v) = parse_fenced(cleaned) {
        return Some(v);
    }

    if let Some(Ok(v)) = serde_json::Deserializer::from_str(cleaned)
        .into_iter::<Value>()
        .next()
    {
        return Some(v);
    }

    parse_brace_span(cleaned)
}

/// 第一个与最后一个 ``` 之间的内容；去掉开头的 json 语言标记
fn parse_fenced(text: &str) -> Option<Value> {
    let start = text.find(FENCE)?;
    let end = text.rfind(FENCE)?;
    if start == end {
        return None;
    }
    let mut inner = text[start + FENCE.len()..end].trim();
    if inner
        .get(..4)
        .map(|tag| tag.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
    {
        inner = inner[4..].trim();
    }
    serde_json::from_str(inner).ok()
}

fn parse_brace_span(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(extract_json(r#"  {"a": 1}  "#), Some(json!({"a": 1})));
    }

    #[test]
    fn test_fenced_block_with_language_tag() {
        let raw = "Here you go:\n```JSON\n{\"intent\": \"combat\"}\n```\nanything else?";
        assert_eq!(extract_json(raw), Some(json!({"intent": "combat"})));
    }

    #[test]
    fn test_fenced_block_without_tag() {
        let raw = "```\n{\"x\": [1, 2]}\n```";
        assert_eq!(extract_json(raw), Some(json!({"x": [1, 2]})));
    }

    #[test]
    fn test_trailing_text_is_ignored() {
        let raw = r#"{"intent": "dialogue"} I hope this helps!"#;
        assert_eq!(extract_json(raw), Some(json!({"intent": "dialogue"})));
    }

    #[test]
    fn test_leading_prose_uses_brace_span() {
        let raw = r#"Sure! {"intent": "exploration", "narrative": "You look {around}."} Done."#;
        assert_eq!(
            extract_json(raw),
            Some(json!({"intent": "exploration", "narrative": "You look {around}."}))
        );
    }

    #[test]
    fn test_single_fence_falls_through() {
        let raw = "``` {\"a\": true}";
        assert_eq!(extract_json(raw), Some(json!({"a": true})));
    }

    #[test]
    fn test_failures() {
        assert_eq!(extract_json(""), None);
        assert_eq!(extract_json("   \n"), None);
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
        assert_eq!(extract_json(r#"broken {"a": }"#), None);
    }

    #[test]
    fn test_non_object_values_are_returned() {
        // 提取器只负责解码，是否为对象由 sanitize 判断
        assert_eq!(extract_json("[1, 2, 3]"), Some(json!([1, 2, 3])));
        assert_eq!(extract_json(r#""just a string""#), Some(json!("just a string")));
    }
}
