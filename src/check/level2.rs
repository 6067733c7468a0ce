//! Level 2 Checker Module
//!
//! データ構造と値の妥当性を検査するレベル2チェッカー。
//! ヘッダーが検出されたテーブルを前提とし、ヘッダーのないファイルでは
//! すべてのルールが適用対象外（NotApplicable）として報告されます。

use std::collections::BTreeMap;

use crate::check::{no_evaluator, CheckResult, Checker};
use crate::rules::{CheckLevel, Rule, RuleParams, RuleSet};
use crate::table::{is_numeric_like, Cell, Table};
use crate::types::CellValue;

/// 欠損値を表すテキスト表現（小文字・トリム済みで比較）
const MISSING_SENTINELS: &[&str] = &[
    "n/a", "na", "nan", "-", "--", "---", "ー", "―", "－", "不明", "不詳", "なし", "無し",
    "該当なし", "無回答", "無記入", "未記入", "未回答", "対象外", "null", "none", "?", "？",
];

/// レベル2チェッカー
pub struct Level2Checker;

impl Checker for Level2Checker {
    fn level(&self) -> CheckLevel {
        CheckLevel::Level2
    }

    fn check(&self, tables: &[Table], ruleset: &RuleSet) -> Vec<CheckResult> {
        // ヘッダーが検出されたテーブルだけが評価対象
        let target_tables: Vec<&Table> =
            tables.iter().filter(|t| t.header_row.is_some()).collect();

        ruleset
            .rules_for_level(CheckLevel::Level2)
            .into_iter()
            .map(|rule| {
                if target_tables.is_empty() {
                    return CheckResult::not_applicable(
                        rule,
                        "ヘッダー行が検出されなかったため適用対象外です",
                    );
                }
                match rule.id.as_str() {
                    "L2-01" => check_numeric_columns(rule, &target_tables),
                    "L2-02" => check_free_text_separation(rule, &target_tables),
                    "L2-03" => check_header_uniqueness(rule, &target_tables),
                    "L2-04" => check_missing_value_consistency(rule, &target_tables),
                    _ => no_evaluator(rule),
                }
            })
            .collect()
    }
}

/// セルが欠損値を表す場合、その表現形式を返す
///
/// 空セルと各センチネル文字列はそれぞれ別の形式として数えられます。
pub(crate) fn missing_form(cell: &Cell) -> Option<String> {
    match &cell.value {
        CellValue::Empty => Some("空セル".to_string()),
        CellValue::Text(text) => {
            let normalized = text.trim().to_lowercase();
            if MISSING_SENTINELS.contains(&normalized.as_str()) {
                Some(format!("\"{}\"", text.trim()))
            } else {
                None
            }
        }
        CellValue::Number(_) => None,
    }
}

/// 選択肢（カテゴリカル）列の検出
///
/// 欠損を除く値の異なり数が小さく（2〜`max_categories`）、
/// かつ繰り返しが存在する列を選択肢列とみなします。
/// レベル3のコード表チェックがこの判定を前提条件として参照します。
pub(crate) fn categorical_columns(table: &Table, params: &RuleParams) -> Vec<String> {
    let mut columns = Vec::new();

    for col in 0..table.column_count() {
        let values: Vec<String> = table
            .column_cells(col)
            .into_iter()
            .filter(|cell| missing_form(cell).is_none())
            .map(|cell| cell.raw.clone())
            .collect();
        if values.len() < 2 {
            continue;
        }

        let distinct: std::collections::BTreeSet<&String> = values.iter().collect();
        if distinct.len() >= 2 && distinct.len() <= params.max_categories
            && distinct.len() < values.len()
        {
            columns.push(table.column_name(col));
        }
    }

    columns
}

/// L2-01: 数値列に数値以外のデータが混入していないこと
///
/// 数値らしい値の割合がしきい値を超える列を数値列候補とし、
/// その中で数値として解釈できない値を許容割合と比較します。
fn check_numeric_columns(rule: &Rule, tables: &[&Table]) -> CheckResult {
    let params = &rule.parameters;
    let mut evidence = Vec::new();

    for table in tables {
        for col in 0..table.column_count() {
            let values: Vec<&Cell> = table
                .column_cells(col)
                .into_iter()
                .filter(|cell| missing_form(cell).is_none())
                .collect();
            if values.is_empty() {
                continue;
            }

            // 数値らしい値の割合（桁区切りなどの装飾を許容した緩い判定）
            let numeric_like = values
                .iter()
                .filter(|cell| match &cell.value {
                    CellValue::Number(_) => true,
                    CellValue::Text(text) => is_numeric_like(text),
                    CellValue::Empty => false,
                })
                .count();
            let ratio = numeric_like as f64 / values.len() as f64;
            if ratio <= params.numeric_ratio_threshold {
                continue;
            }

            // 数値列候補: 厳密に解釈できない値を数える
            let outliers: Vec<&&Cell> = values
                .iter()
                .filter(|cell| match &cell.value {
                    CellValue::Number(_) => false,
                    CellValue::Text(text) => text.trim().parse::<f64>().is_err(),
                    CellValue::Empty => false,
                })
                .collect();
            if outliers.is_empty() {
                continue;
            }

            let outlier_ratio = outliers.len() as f64 / values.len() as f64;
            if outlier_ratio > params.numeric_outlier_tolerance {
                let samples: Vec<String> =
                    outliers.iter().take(3).map(|c| c.raw.clone()).collect();
                evidence.push(format!(
                    "{}: 列「{}」（例: {}）",
                    table.sheet_name,
                    table.column_name(col),
                    samples.join(", ")
                ));
            }
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(
            rule,
            "数値列に数値以外のデータが含まれています",
            evidence,
        );
    }
    CheckResult::pass(rule, "数値列に不正なデータは含まれていません")
}

/// L2-02: 自由記述が選択肢の列と分離されていること
///
/// 少数の定型値と長い自由記述が同一列に混在する場合、および
/// 列名が「その他」のみで自由記述列であることを示さない場合に
/// 違反とします。
fn check_free_text_separation(rule: &Rule, tables: &[&Table]) -> CheckResult {
    let params = &rule.parameters;
    let mut evidence = Vec::new();

    for table in tables {
        for col in 0..table.column_count() {
            let name = table.column_name(col);

            // 列名ベースの判定（「その他」と自由記述の未分離）
            if name.contains("その他") && !name.contains("自由") {
                evidence.push(format!("{}: 列「{}」", table.sheet_name, name));
                continue;
            }

            // 値ベースの判定（定型値と長文の混在）
            let values: Vec<String> = table
                .column_cells(col)
                .into_iter()
                .filter(|cell| missing_form(cell).is_none())
                .map(|cell| cell.raw.clone())
                .collect();
            if values.is_empty() {
                continue;
            }

            let (short, long): (Vec<&String>, Vec<&String>) = values
                .iter()
                .partition(|v| v.chars().count() < params.free_text_min_len);
            if long.is_empty() || short.len() <= long.len() {
                continue;
            }

            let distinct_short: std::collections::BTreeSet<&&String> = short.iter().collect();
            if distinct_short.len() >= 2
                && distinct_short.len() <= params.max_categories
                && distinct_short.len() < short.len()
            {
                evidence.push(format!(
                    "{}: 列「{}」（定型値{}種と自由記述{}件が混在）",
                    table.sheet_name,
                    name,
                    distinct_short.len(),
                    long.len()
                ));
            }
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(
            rule,
            "自由記述が選択肢の列と分離されていない可能性があります",
            evidence,
        );
    }
    CheckResult::pass(rule, "その他の詳細記述は適切に分離されています")
}

/// L2-03: すべての列に一意で意味のある項目名があること
fn check_header_uniqueness(rule: &Rule, tables: &[&Table]) -> CheckResult {
    let mut evidence = Vec::new();

    for table in tables {
        let Some(headers) = table.headers() else {
            continue;
        };

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for header in &headers {
            let name = header.trim().to_string();
            if name.is_empty() {
                evidence.push(format!(
                    "{}: 空の列名があります",
                    table.sheet_name
                ));
                continue;
            }
            *counts.entry(name).or_insert(0) += 1;
        }

        for (name, count) in counts {
            if count > 1 {
                evidence.push(format!(
                    "{}: 列名「{}」が{}回重複しています",
                    table.sheet_name, name, count
                ));
            }
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(
            rule,
            "省略・重複した列名が検出されました",
            evidence,
        );
    }
    CheckResult::pass(rule, "すべての列に一意な項目名が付けられています")
}

/// L2-04: 欠損値の表現が列内で一貫していること
///
/// 列内で2種類以上の欠損表現（空セル・"N/A"・"-"など）が混在する
/// 場合に違反とします。
fn check_missing_value_consistency(rule: &Rule, tables: &[&Table]) -> CheckResult {
    let mut evidence = Vec::new();

    for table in tables {
        for col in 0..table.column_count() {
            let mut forms: Vec<String> = Vec::new();
            for cell in table.column_cells(col) {
                if let Some(form) = missing_form(cell) {
                    if !forms.contains(&form) {
                        forms.push(form);
                    }
                }
            }

            if forms.len() >= 2 {
                evidence.push(format!(
                    "{}: 列「{}」（{}）",
                    table.sheet_name,
                    table.column_name(col),
                    forms.join(" と ")
                ));
            }
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(
            rule,
            "欠損値の表現が列内で混在しています",
            evidence,
        );
    }
    CheckResult::pass(rule, "欠損値の表現は一貫しています")
}
