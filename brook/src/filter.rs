//! # 消息头过滤

use std::collections::HashMap;

/// 消息头谓词
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderPredicate {
    /// 消息头值包含子串
    Contains {
        /// 消息头名称
        header: String,
        /// 子串
        needle: String,
    },
    /// 消息头值完全相等
    Equals {
        /// 消息头名称
        header: String,
        /// 期望值
        value: String,
    },
}

impl HeaderPredicate {
    /// 消息头缺失时视为通过
    fn test(&self, headers: &HashMap<String, String>) -> bool {
        match self {
            HeaderPredicate::Contains { header, needle } => headers
                .get(header)
                .is_none_or(|actual| actual.contains(needle.as_str())),
            HeaderPredicate::Equals { header, value } => {
                headers.get(header).is_none_or(|actual| actual == value)
            }
        }
    }
}

/// 消息头过滤器，全部谓词通过才保留记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFilter {
    predicates: Vec<HeaderPredicate>,
}

impl HeaderFilter {
    /// 构造空过滤器
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加子串匹配谓词
    pub fn contains(mut self, header: impl Into<String>, needle: impl Into<String>) -> Self {
        self.predicates.push(HeaderPredicate::Contains {
            header: header.into(),
            needle: needle.into(),
        });
        self
    }

    /// 追加精确匹配谓词
    pub fn equals(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(HeaderPredicate::Equals {
            header: header.into(),
            value: value.into(),
        });
        self
    }

    /// 是否没有任何谓词
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// 判断记录消息头是否通过
    pub fn matches(&self, headers: &HashMap<String, String>) -> bool {
        self.predicates.iter().all(|p| p.test(headers))
    }
}
