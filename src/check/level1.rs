//! Level 1 Checker Module
//!
//! ファイル形式と構造の健全性を検査するレベル1チェッカー。
//! 結合セル・非表示行列・埋め込みオブジェクト・書式による意味づけなど、
//! 表の構造メタデータだけを参照します。元形式が情報を表現できない場合、
//! 該当ルールは「検証不可の警告」に格下げされます。

use crate::check::{cell_evidence, no_evaluator, CheckResult, Checker};
use crate::rules::{CheckLevel, Rule, RuleSet};
use crate::table::Table;
use crate::types::{Capability, CellValue, FileFormat};

/// 1セル内の複数データを示唆する区切り文字
const MULTI_VALUE_SEPARATORS: [char; 4] = ['\n', ',', ';', '/'];

/// レベル1チェッカー
pub struct Level1Checker;

impl Checker for Level1Checker {
    fn level(&self) -> CheckLevel {
        CheckLevel::Level1
    }

    fn check(&self, tables: &[Table], ruleset: &RuleSet) -> Vec<CheckResult> {
        ruleset
            .rules_for_level(CheckLevel::Level1)
            .into_iter()
            .map(|rule| match rule.id.as_str() {
                "L1-01" => check_file_format(rule, tables),
                "L1-02" => check_embedded_objects(rule, tables),
                "L1-03" => check_merged_cells(rule, tables),
                "L1-04" => check_format_semantics(rule, tables),
                "L1-05" => check_one_table_per_sheet(rule, tables),
                "L1-06" => check_hidden_rows_cols(rule, tables),
                "L1-07" => check_single_value_per_cell(rule, tables),
                "L1-08" => check_whitespace_formatting(rule, tables),
                "L1-09" => check_notes_outside_table(rule, tables),
                "L1-10" => check_machine_dependent_chars(rule, tables),
                _ => no_evaluator(rule),
            })
            .collect()
    }
}

/// L1-01: ファイル形式の妥当性（ファイルレベルルール）
///
/// このルールの不合格だけが後続レベルの評価を打ち切ります
/// （ランナー側の早期終了条件）。
fn check_file_format(rule: &Rule, tables: &[Table]) -> CheckResult {
    let format = match tables.first() {
        Some(table) => table.file_format,
        None => {
            return CheckResult::violation(rule, "診断対象のシートがありません", Vec::new());
        }
    };

    match format {
        FileFormat::Csv => CheckResult::pass(rule, "ファイル形式はCSVです"),
        FileFormat::Xlsx => CheckResult::pass(rule, "ファイル形式はExcel（.xlsx）です"),
        FileFormat::Xls => CheckResult::pass(
            rule,
            "旧Excel（.xls）形式のため、一部の自動チェック（書式・図形など）が制限されます",
        ),
    }
}

/// L1-02: 画像・図形などの埋め込みオブジェクトがないこと
fn check_embedded_objects(rule: &Rule, tables: &[Table]) -> CheckResult {
    let mut evidence = Vec::new();
    let mut any_unsupported = false;

    for table in tables {
        match &table.embedded_objects {
            Capability::Supported(count) if *count > 0 => {
                evidence.push(format!("{}: {}件", table.sheet_name, count));
            }
            Capability::Supported(_) => {}
            Capability::Unsupported => any_unsupported = true,
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(
            rule,
            "図形・画像などのオブジェクトが検出されました",
            evidence,
        );
    }
    if any_unsupported {
        return CheckResult::cannot_verify(rule, "図形や画像の有無");
    }
    CheckResult::pass(rule, "画像やオブジェクトは含まれていません")
}

/// L1-03: 結合セルがないこと
fn check_merged_cells(rule: &Rule, tables: &[Table]) -> CheckResult {
    let mut evidence = Vec::new();
    let mut any_unsupported = false;

    for table in tables {
        match &table.merged_regions {
            Capability::Supported(regions) => {
                for region in regions {
                    evidence.push(format!(
                        "{}!{}",
                        table.sheet_name,
                        region.range.to_a1_notation()
                    ));
                }
            }
            Capability::Unsupported => any_unsupported = true,
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(rule, "結合セルが検出されました", evidence);
    }
    if any_unsupported {
        return CheckResult::cannot_verify(rule, "結合セルの有無");
    }
    CheckResult::pass(rule, "結合セルはありません")
}

/// L1-04: 書式（塗りつぶし・太字）によるデータの意味づけがないこと
///
/// 列内に書式付きセルと書式なしセルが混在し、少数派の割合が
/// しきい値（`format_ratio_threshold`）以上の場合、書式が値の区別を
/// 符号化しているとみなします。ヘッダー行の装飾は判定対象外です。
fn check_format_semantics(rule: &Rule, tables: &[Table]) -> CheckResult {
    let threshold = rule.parameters.format_ratio_threshold;
    let mut evidence = Vec::new();
    let mut any_unsupported = false;

    for table in tables {
        if !table.styles_supported {
            any_unsupported = true;
            continue;
        }

        for col in 0..table.column_count() {
            let cells: Vec<_> = table
                .column_cells(col)
                .into_iter()
                .filter(|cell| !cell.value.is_empty())
                .collect();
            if cells.is_empty() {
                continue;
            }

            let styled: Vec<_> = cells.iter().filter(|c| c.style.is_styled()).collect();
            if styled.is_empty() || styled.len() == cells.len() {
                // 全セル同一書式（または無書式）は様式上の装飾とみなす
                continue;
            }

            let ratio = styled.len() as f64 / cells.len() as f64;
            if ratio.min(1.0 - ratio) >= threshold {
                let sample = styled
                    .first()
                    .map(|c| cell_evidence(&table.sheet_name, c.coord()))
                    .unwrap_or_default();
                evidence.push(format!(
                    "{}: 列「{}」（例: {}）",
                    table.sheet_name,
                    table.column_name(col),
                    sample
                ));
            }
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(
            rule,
            "書式によって値を区別しているとみられる列があります",
            evidence,
        );
    }
    if any_unsupported {
        return CheckResult::cannot_verify(rule, "セル書式による意味づけ");
    }
    CheckResult::pass(rule, "書式ベースの意味づけは検出されませんでした")
}

/// L1-05: 1シートに1つの表のみであること
fn check_one_table_per_sheet(rule: &Rule, tables: &[Table]) -> CheckResult {
    let evidence: Vec<String> = tables
        .iter()
        .filter(|table| table.multiple_regions)
        .map(|table| table.sheet_name.clone())
        .collect();

    if !evidence.is_empty() {
        return CheckResult::violation(
            rule,
            "複数の表が含まれている可能性のあるシートがあります",
            evidence,
        );
    }
    CheckResult::pass(rule, "各シートに1つの表のみです")
}

/// L1-06: 非表示の行・列がないこと
fn check_hidden_rows_cols(rule: &Rule, tables: &[Table]) -> CheckResult {
    let mut evidence = Vec::new();
    let mut any_unsupported = false;

    for table in tables {
        match (&table.hidden_rows, &table.hidden_cols) {
            (Capability::Supported(rows), Capability::Supported(cols)) => {
                if !rows.is_empty() {
                    let listed: Vec<String> =
                        rows.iter().map(|r| (r + 1).to_string()).collect();
                    evidence.push(format!(
                        "{}: 非表示行 {}",
                        table.sheet_name,
                        listed.join(",")
                    ));
                }
                if !cols.is_empty() {
                    let listed: Vec<String> = cols
                        .iter()
                        .map(|c| {
                            crate::types::CellCoord::new(0, *c)
                                .to_a1_notation()
                                .trim_end_matches(|ch: char| ch.is_ascii_digit())
                                .to_string()
                        })
                        .collect();
                    evidence.push(format!(
                        "{}: 非表示列 {}",
                        table.sheet_name,
                        listed.join(",")
                    ));
                }
            }
            _ => any_unsupported = true,
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(rule, "非表示の行・列があります", evidence);
    }
    if any_unsupported {
        return CheckResult::cannot_verify(rule, "非表示の行・列");
    }
    CheckResult::pass(rule, "行や列の非表示はありません")
}

/// L1-07: 1セルに1データのみであること
///
/// セル内の改行・カンマ・セミコロン・スラッシュを複数データの
/// 区切りとみなします。
fn check_single_value_per_cell(rule: &Rule, tables: &[Table]) -> CheckResult {
    let mut evidence = Vec::new();

    for table in tables {
        for row in &table.rows {
            for cell in row {
                if let CellValue::Text(text) = &cell.value {
                    if text.contains(&MULTI_VALUE_SEPARATORS[..]) {
                        evidence.push(format!(
                            "{}（{}）",
                            cell_evidence(&table.sheet_name, cell.coord()),
                            text.replace('\n', "\\n")
                        ));
                    }
                }
            }
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(rule, "複数データを含むセルが検出されました", evidence);
    }
    CheckResult::pass(rule, "各セルに1データのみです")
}

/// L1-08: スペースや改行による整形がないこと
fn check_whitespace_formatting(rule: &Rule, tables: &[Table]) -> CheckResult {
    let mut evidence = Vec::new();

    for table in tables {
        for row in &table.rows {
            for cell in row {
                if let CellValue::Text(text) = &cell.value {
                    if text.trim() != text || text.contains('\n') {
                        evidence.push(format!(
                            "{}（{:?}）",
                            cell_evidence(&table.sheet_name, cell.coord()),
                            text
                        ));
                    }
                }
            }
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(
            rule,
            "余分な空白・改行による整形が検出されました",
            evidence,
        );
    }
    CheckResult::pass(rule, "スペースや改行による整形はありません")
}

/// L1-09: 表の外に注記・備考がないこと
fn check_notes_outside_table(rule: &Rule, tables: &[Table]) -> CheckResult {
    let mut evidence = Vec::new();

    for table in tables {
        for (coord, text) in &table.outside_cells {
            evidence.push(format!(
                "{}（{}）",
                cell_evidence(&table.sheet_name, *coord),
                text
            ));
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(
            rule,
            "表の外に注記・備考とみられるセルがあります",
            evidence,
        );
    }
    CheckResult::pass(rule, "表外のメモや備考は検出されませんでした")
}

/// L1-10: 機種依存文字が含まれていないこと
fn check_machine_dependent_chars(rule: &Rule, tables: &[Table]) -> CheckResult {
    let mut evidence = Vec::new();

    for table in tables {
        for row in &table.rows {
            for cell in row {
                if cell.machine_dependent {
                    evidence.push(format!(
                        "{}（{}）",
                        cell_evidence(&table.sheet_name, cell.coord()),
                        cell.raw
                    ));
                }
            }
        }
    }

    if !evidence.is_empty() {
        return CheckResult::violation(rule, "機種依存文字が含まれています", evidence);
    }
    CheckResult::pass(rule, "機種依存文字は含まれていません")
}
