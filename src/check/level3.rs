//! Level 3 Checker Module
//!
//! メタデータ・ドキュメントの充実度を検査するレベル3チェッカー。
//! 単一の表ではなくファイル・シート集合の全体を対象とし、シート名や
//! マーカー行の有無によるヒューリスティクスで判定します。
//! 証拠が曖昧な場合は不合格ではなく警告として報告します。

use crate::check::level2::categorical_columns;
use crate::check::{no_evaluator, CheckResult, Checker};
use crate::rules::{CheckLevel, Rule, RuleSet};
use crate::table::Table;

/// コード表らしいシート名のキーワード
const CODE_SHEET_KEYWORDS: &[&str] = &["code", "コード", "master", "マスタ", "codebook"];

/// 設問マスター・変数定義表らしいシート名のキーワード
const QUESTION_SHEET_KEYWORDS: &[&str] = &[
    "question", "設問", "変数", "variable", "var", "項目", "item", "定義", "master", "マスタ",
];

/// シート内容を走査する行数の上限
const CONTENT_SCAN_ROWS: usize = 10;

/// レベル3チェッカー
pub struct Level3Checker;

impl Checker for Level3Checker {
    fn level(&self) -> CheckLevel {
        CheckLevel::Level3
    }

    fn check(&self, tables: &[Table], ruleset: &RuleSet) -> Vec<CheckResult> {
        ruleset
            .rules_for_level(CheckLevel::Level3)
            .into_iter()
            .map(|rule| match rule.id.as_str() {
                "L3-01" => check_code_table_exists(rule, tables),
                "L3-02" => check_question_master_exists(rule, tables),
                "L3-03" => check_metadata_presence(rule, tables),
                _ => no_evaluator(rule),
            })
            .collect()
    }
}

/// シートの先頭数行と境界外セルのテキストを収集
fn sheet_text_sample(table: &Table) -> Vec<String> {
    let mut texts = Vec::new();
    for row in table.rows.iter().take(CONTENT_SCAN_ROWS) {
        for cell in row {
            if !cell.raw.is_empty() {
                texts.push(cell.raw.clone());
            }
        }
    }
    for (_, text) in &table.outside_cells {
        texts.push(text.clone());
    }
    texts
}

/// シート名がキーワードのいずれかを含むか（ASCIIは小文字化して比較）
fn sheet_name_matches(name: &str, keywords: &[&str]) -> bool {
    let lowered = name.to_lowercase();
    keywords.iter().any(|kw| lowered.contains(kw))
}

/// 「1=男性」「2：女性」のようなコード対応行かどうか
fn is_code_mapping_line(text: &str) -> bool {
    let mut chars = text.trim().chars().peekable();

    // 先頭は1桁以上の数字
    let mut saw_digit = false;
    while let Some(ch) = chars.peek() {
        if ch.is_ascii_digit() {
            saw_digit = true;
            chars.next();
        } else {
            break;
        }
    }
    if !saw_digit {
        return false;
    }

    // 空白を読み飛ばして区切り記号
    while let Some(ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }
    let Some(sep) = chars.next() else {
        return false;
    };
    if !matches!(sep, '=' | '＝' | ':' | '：') {
        return false;
    }

    // 区切りの後に空白以外の内容があること
    chars.any(|ch| !ch.is_whitespace())
}

/// L3-01: 選択肢に対応するコード表が存在すること
///
/// レベル2の選択肢列検出を前提条件とし、選択肢列がなければ
/// 適用対象外です。シート名による一致、またはコード対応行
/// （「1=〇〇」形式）の存在で充足とみなします。
fn check_code_table_exists(rule: &Rule, tables: &[Table]) -> CheckResult {
    let has_categorical = tables
        .iter()
        .filter(|t| t.header_row.is_some())
        .any(|t| !categorical_columns(t, &rule.parameters).is_empty());
    if !has_categorical {
        return CheckResult::not_applicable(
            rule,
            "選択肢（コード）列が検出されなかったため適用対象外です",
        );
    }

    // シート名での判定
    for table in tables {
        if sheet_name_matches(&table.sheet_name, CODE_SHEET_KEYWORDS) {
            return CheckResult::pass(
                rule,
                format!("コード表とみられるシート: {}", table.sheet_name),
            );
        }
    }

    // 内容での判定（1=〇〇のような表記）
    for table in tables {
        if sheet_text_sample(table)
            .iter()
            .any(|text| is_code_mapping_line(text))
        {
            return CheckResult::pass(
                rule,
                format!("内容からコード表と推定されるシート: {}", table.sheet_name),
            );
        }
    }

    CheckResult::violation(rule, "コード表が見つかりません", Vec::new())
}

/// L3-02: 全項目を記載した設問・変数定義表が存在すること
///
/// シート名の一致は充足、内容キーワードのみの一致は曖昧な証拠として
/// 警告になります。
fn check_question_master_exists(rule: &Rule, tables: &[Table]) -> CheckResult {
    for table in tables {
        if sheet_name_matches(&table.sheet_name, QUESTION_SHEET_KEYWORDS) {
            return CheckResult::pass(
                rule,
                format!("設問マスターとみられるシート: {}", table.sheet_name),
            );
        }
    }

    for table in tables {
        let sample = sheet_text_sample(table);
        let hit = sample.iter().any(|text| {
            let lowered = text.to_lowercase();
            ["設問", "変数", "question", "variable"]
                .iter()
                .any(|kw| lowered.contains(kw))
        });
        if hit {
            return CheckResult::warning(
                rule,
                format!(
                    "シート '{}' の内容に設問定義らしき記述がありますが、独立した定義表は確認できません",
                    table.sheet_name
                ),
                Vec::new(),
            );
        }
    }

    CheckResult::violation(
        rule,
        "設問マスター（変数定義表）が見つかりません",
        Vec::new(),
    )
}

/// 必須メタデータフィールドに対応する検索キーワード
fn metadata_keywords(field: &str) -> Vec<&str> {
    match field {
        "title" => vec!["タイトル", "表題", "題名", "title"],
        "source" => vec!["出典", "調査名", "source"],
        "unit" => vec!["単位", "unit"],
        "date" => vec!["調査日", "作成日", "日付", "年月日", "date"],
        other => vec![other],
    }
}

/// L3-03: 文書レベルのメタ情報が揃っていること
///
/// ルールセットの必須フィールドリストに対し、全シートの先頭行と
/// 境界外セルからマーカーを検索します。すべて見つかれば合格、
/// 一部のみは曖昧な証拠として警告、まったく見つからなければ違反です。
fn check_metadata_presence(rule: &Rule, tables: &[Table]) -> CheckResult {
    let required = &rule.parameters.required_metadata_fields;
    if required.is_empty() {
        return CheckResult::not_applicable(rule, "必須メタデータフィールドが設定されていません");
    }

    let samples: Vec<String> = tables
        .iter()
        .flat_map(|table| sheet_text_sample(table))
        .map(|text| text.to_lowercase())
        .collect();

    let mut missing = Vec::new();
    for field in required {
        let keywords = metadata_keywords(field);
        let found = samples
            .iter()
            .any(|text| keywords.iter().any(|kw| text.contains(kw)));
        if !found {
            missing.push(field.clone());
        }
    }

    if missing.is_empty() {
        CheckResult::pass(rule, "必須のメタ情報がすべて確認できました")
    } else if missing.len() == required.len() {
        CheckResult::violation(
            rule,
            "調査概要やメタデータが確認できません",
            missing,
        )
    } else {
        CheckResult::warning(
            rule,
            "一部のメタ情報が確認できません",
            missing,
        )
    }
}
