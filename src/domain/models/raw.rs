// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// 原始文档
///
/// 一个工作单元的未处理响应体。仅在抓取与解析之间
/// 短暂存在，不持久化；内容摘要随文档传递，供解析失败时
/// 的日志定位。
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// 产生该文档的工作单元键
    pub unit_key: String,
    /// 请求的URL
    pub url: String,
    /// HTTP状态码
    pub status_code: u16,
    /// 响应体
    pub body: String,
    /// 响应体的SHA-256摘要（十六进制）
    pub content_hash: String,
    /// 抓取时间
    pub fetched_at: DateTime<FixedOffset>,
}

impl RawDocument {
    /// 创建一个新的原始文档并计算内容摘要
    pub fn new(unit_key: &str, url: &str, status_code: u16, body: String) -> Self {
        let content_hash = hex::encode(Sha256::digest(body.as_bytes()));
        Self {
            unit_key: unit_key.to_string(),
            url: url.to_string(),
            status_code,
            body,
            content_hash,
            fetched_at: Utc::now().into(),
        }
    }
}

/// 原始记录
///
/// 解析器从单个文档中提取的候选记录，字段名保留上游
/// 中文键名，由标准化器映射为类型化的执照记录。缺失的
/// 字段缺席于映射，而不是令整个文档解析失败。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// 上游索引键
    pub index_key: String,
    /// 字段映射（上游键名 → 清理前的原始值）
    pub fields: BTreeMap<String, String>,
    /// 楼层概要等嵌套结构
    pub nested: serde_json::Value,
}

impl RawRecord {
    /// 创建一个新的原始记录
    pub fn new(index_key: &str) -> Self {
        Self {
            index_key: index_key.to_string(),
            fields: BTreeMap::new(),
            nested: serde_json::Value::Null,
        }
    }

    /// 读取字段值
    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        let a = RawDocument::new("k", "http://example.com", 200, "body".to_string());
        let b = RawDocument::new("k", "http://example.com", 200, "body".to_string());
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn test_missing_field_reads_empty() {
        let record = RawRecord::new("abc");
        assert_eq!(record.field("發照日期"), "");
    }
}
