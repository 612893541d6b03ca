//! # 记录解码

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;

/// 代理交付的原始记录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// 主题
    pub topic: String,
    /// 分区
    pub partition: i32,
    /// 偏移量
    pub offset: i64,
    /// 键
    pub key: Option<Vec<u8>>,
    /// 值
    pub value: Option<Vec<u8>>,
    /// 消息头，值可能为空
    pub headers: Vec<(String, Option<Vec<u8>>)>,
    /// 时间戳（毫秒）
    pub timestamp: Option<i64>,
}

/// 解码后的记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumedRecord {
    /// 主题
    pub topic: String,
    /// 分区
    pub partition: i32,
    /// 偏移量的十进制文本
    pub offset: String,
    /// 键
    pub key: Option<String>,
    /// 值：结构化对象，或 `{"raw": 原文}`
    pub value: Option<Value>,
    /// 消息头
    pub headers: HashMap<String, String>,
    /// 时间戳（毫秒）的十进制文本，缺失时为 `-1`
    pub timestamp: String,
}

impl ConsumedRecord {
    /// 偏移量数值
    pub fn offset_u64(&self) -> Option<u64> {
        self.offset.parse().ok()
    }

    /// 读取消息头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// 按点分路径读取值中的字段，如 `statistics.viewCount`
    pub fn field(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(self.value.as_ref()?, |value, segment| value.get(segment))
    }
}

/// 解码原始记录，任何输入都不会失败
pub fn decode(raw: RawRecord) -> ConsumedRecord {
    let headers = raw
        .headers
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, decode_text(v))))
        .collect();

    ConsumedRecord {
        topic: raw.topic,
        partition: raw.partition,
        offset: raw.offset.to_string(),
        key: raw.key.map(decode_text),
        value: raw.value.map(decode_value),
        headers,
        timestamp: raw.timestamp.unwrap_or(-1).to_string(),
    }
}

fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn decode_value(bytes: Vec<u8>) -> Value {
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(_) => json!({ "raw": decode_text(bytes) }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn raw(value: Option<&[u8]>) -> RawRecord {
        RawRecord {
            topic: "naver-search-results".to_owned(),
            partition: 2,
            offset: 41,
            key: Some(b"shop:butter".to_vec()),
            value: value.map(<[u8]>::to_vec),
            headers: vec![
                ("query".to_owned(), Some("butter".as_bytes().to_vec())),
                ("searchType".to_owned(), Some(b"shop".to_vec())),
                ("empty".to_owned(), None),
            ],
            timestamp: Some(1_700_000_000_000),
        }
    }

    #[test]
    fn structured_value_is_parsed() {
        let record = decode(raw(Some(br#"{"category":"dairy","lprice":"4200"}"#)));

        assert_eq!(record.value, Some(json!({"category": "dairy", "lprice": "4200"})));
        assert_eq!(record.offset, "41");
        assert_eq!(record.offset_u64(), Some(41));
        assert_eq!(record.key.as_deref(), Some("shop:butter"));
        assert_eq!(record.timestamp, "1700000000000");
        assert_eq!(record.header("searchType"), Some("shop"));
    }

    #[test]
    fn header_without_value_is_skipped() {
        let record = decode(raw(None));

        assert_eq!(record.headers.len(), 2);
        assert!(record.header("empty").is_none());
    }

    #[test]
    fn absent_value_and_timestamp() {
        let mut input = raw(None);
        input.key = None;
        input.timestamp = None;

        let record = decode(input);

        assert!(record.value.is_none());
        assert!(record.key.is_none());
        assert_eq!(record.timestamp, "-1");
    }

    #[rstest]
    #[case(b"not json at all".as_slice(), "not json at all")]
    #[case(b"{\"truncated\":".as_slice(), "{\"truncated\":")]
    #[case(b"".as_slice(), "")]
    fn malformed_value_is_wrapped_raw(#[case] bytes: &[u8], #[case] text: &str) {
        let record = decode(raw(Some(bytes)));

        assert_eq!(record.value, Some(json!({ "raw": text })));
    }

    #[test]
    fn invalid_utf8_never_fails() {
        let mut input = raw(Some(&[0xff, 0xfe, b'a']));
        input.key = Some(vec![0xc3]);
        input.headers = vec![("query".to_owned(), Some(vec![0x80, b'b']))];

        let record = decode(input);

        assert_eq!(record.value, Some(json!({ "raw": "\u{fffd}\u{fffd}a" })));
        assert_eq!(record.key.as_deref(), Some("\u{fffd}"));
        assert_eq!(record.header("query"), Some("\u{fffd}b"));
    }

    #[test]
    fn nested_field_lookup() {
        let record = decode(raw(Some(
            br#"{"video":{"videoId":"v1"},"statistics":{"viewCount":"1200"}}"#,
        )));

        assert_eq!(record.field("video.videoId"), Some(&json!("v1")));
        assert_eq!(record.field("statistics.viewCount"), Some(&json!("1200")));
        assert!(record.field("statistics.likeCount").is_none());
        assert!(record.field("video.videoId.deeper").is_none());
    }
}
