// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 清理上游文本字段
///
/// 去除全角空格与冒号、遮蔽符和占位串，统一全角括号，
/// 并修正上游页面中的惯见错字（址址→地址、面績→面積）。
/// 清理后为空或仅含 `-` 占位符时返回空串。
pub fn clean_text(s: &str) -> String {
    let mut out = s
        .replace('\u{3000}', "")
        .replace('：', "")
        .replace("* * *", "")
        .replace("＊＊＊", "")
        .replace("***", "")
        .replace("年月日", "")
        .replace('（', "(")
        .replace('）', ")")
        .replace("址址", "地址")
        .replace("面績", "面積");
    out = out.trim().to_string();
    if out == "-" {
        return String::new();
    }
    out
}

/// 清理为可选字段
///
/// 清理后为空串时返回 None，用于标准化记录的可选字段。
pub fn clean_opt(s: &str) -> Option<String> {
    let cleaned = clean_text(s);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_fullwidth_noise() {
        assert_eq!(clean_text("\u{3000}起造人：王小明\u{3000}"), "起造人王小明");
        assert_eq!(clean_text("（合計）"), "(合計)");
    }

    #[test]
    fn test_clean_text_fixes_upstream_typos() {
        assert_eq!(clean_text("基地面績"), "基地面積");
        assert_eq!(clean_text("門牌址址"), "門牌地址");
    }

    #[test]
    fn test_placeholder_becomes_empty() {
        assert_eq!(clean_text("-"), "");
        assert_eq!(clean_text("  "), "");
        assert_eq!(clean_opt("-"), None);
        assert_eq!(clean_opt("王小明"), Some("王小明".to_string()));
    }
}
