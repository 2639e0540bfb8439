// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// 将民国纪年日期字串转换为日期
///
/// 接受 `113/05/20`、`113年5月20日`、`1130520` 等写法；
/// 只含年月两段时取当月1日；无法解析时返回 None。
pub fn roc_str_to_date(s: &str) -> Option<NaiveDate> {
    let parts: Vec<i32> = DIGITS
        .find_iter(s)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    match parts.as_slice() {
        [y, m] => NaiveDate::from_ymd_opt(y + 1911, *m as u32, 1),
        [y, m, d, ..] => NaiveDate::from_ymd_opt(y + 1911, *m as u32, *d as u32),
        // 无分隔符的紧凑写法，如 1130520
        [compact] if *compact >= 1_01_01 => {
            let y = compact / 10_000;
            let m = (compact / 100) % 100;
            let d = compact % 100;
            NaiveDate::from_ymd_opt(y + 1911, m as u32, d as u32)
        }
        _ => None,
    }
}

/// 将日期格式化为民国纪年
///
/// `slash` 为真时输出 `113/05/20`，否则输出 `1130520`，
/// 与上游查询参数的两种要求对应。
pub fn roc_format(d: NaiveDate, slash: bool) -> String {
    use chrono::Datelike;
    let sep = if slash { "/" } else { "" };
    [
        format!("{}", d.year() - 1911),
        format!("{:02}", d.month()),
        format!("{:02}", d.day()),
    ]
    .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_str_to_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        assert_eq!(roc_str_to_date("113/05/20"), Some(expected));
        assert_eq!(roc_str_to_date("113年5月20日"), Some(expected));
        assert_eq!(roc_str_to_date("1130520"), Some(expected));
    }

    #[test]
    fn test_two_part_date_defaults_to_first_day() {
        assert_eq!(
            roc_str_to_date("113/05"),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(roc_str_to_date(""), None);
        assert_eq!(roc_str_to_date("-"), None);
        assert_eq!(roc_str_to_date("113/13/99"), None);
    }

    #[test]
    fn test_roc_format_round_trip() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        assert_eq!(roc_format(d, true), "113/05/20");
        assert_eq!(roc_format(d, false), "1130520");
        assert_eq!(roc_str_to_date(&roc_format(d, true)), Some(d));
    }
}
