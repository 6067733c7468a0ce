//! Check Module
//!
//! 多段階ルールチェッカーの共通契約を定義するモジュール。
//! 各チェッカーは正規化テーブル群とルールセットを受け取り、
//! レベル内でID昇順に並んだチェック結果のリストを返します。
//! あるルールの不合格が他のルールの評価を打ち切ることはありません。

mod level1;
mod level2;
mod level3;

pub use level1::Level1Checker;
pub use level2::Level2Checker;
pub use level3::Level3Checker;

use serde::Serialize;

use crate::rules::{CheckLevel, Rule, RuleSet, Severity};
use crate::table::Table;

/// 証拠リストに含める例の最大数
pub(crate) const MAX_EXAMPLES: usize = 10;

/// 個別ルールの判定結果ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckStatus {
    /// 合格
    Pass,

    /// 不合格
    Fail,

    /// 警告（検証不可・曖昧な証拠を含む）
    Warning,

    /// 適用対象外
    NotApplicable,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Warning => "warning",
            CheckStatus::NotApplicable => "not-applicable",
        };
        f.write_str(s)
    }
}

/// 1件のルールに対する判定結果
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// ルールID
    pub rule_id: String,

    /// 所属レベル
    pub level: CheckLevel,

    /// 判定ステータス
    pub status: CheckStatus,

    /// 判定メッセージ
    pub message: String,

    /// 証拠（シート・セル座標または列名、最大`MAX_EXAMPLES`件）
    pub evidence: Vec<String>,
}

impl CheckResult {
    /// 合格結果を生成
    pub(crate) fn pass(rule: &Rule, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            level: rule.level,
            status: CheckStatus::Pass,
            message: message.into(),
            evidence: Vec::new(),
        }
    }

    /// 違反結果を生成（深刻度に応じてFailまたはWarning）
    pub(crate) fn violation(
        rule: &Rule,
        message: impl Into<String>,
        evidence: Vec<String>,
    ) -> Self {
        let status = match rule.severity {
            Severity::Error => CheckStatus::Fail,
            Severity::Warning => CheckStatus::Warning,
        };
        Self {
            rule_id: rule.id.clone(),
            level: rule.level,
            status,
            message: message.into(),
            evidence: truncate_examples(evidence),
        }
    }

    /// 警告結果を生成（曖昧な証拠など）
    pub(crate) fn warning(
        rule: &Rule,
        message: impl Into<String>,
        evidence: Vec<String>,
    ) -> Self {
        Self {
            rule_id: rule.id.clone(),
            level: rule.level,
            status: CheckStatus::Warning,
            message: message.into(),
            evidence: truncate_examples(evidence),
        }
    }

    /// 能力ギャップによる「検証不可」の警告結果を生成
    ///
    /// 元形式が構造情報を表現できない場合、対応するルールは
    /// `Pass`でも`Fail`でもなく、この警告に格下げされます。
    pub(crate) fn cannot_verify(rule: &Rule, what: &str) -> Self {
        Self {
            rule_id: rule.id.clone(),
            level: rule.level,
            status: CheckStatus::Warning,
            message: format!(
                "このファイル形式では{}を自動判定できません。必要に応じて目視でご確認ください",
                what
            ),
            evidence: Vec::new(),
        }
    }

    /// 適用対象外の結果を生成
    pub(crate) fn not_applicable(rule: &Rule, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            level: rule.level,
            status: CheckStatus::NotApplicable,
            message: message.into(),
            evidence: Vec::new(),
        }
    }
}

/// 証拠リストを最大件数に切り詰める
pub(crate) fn truncate_examples(mut evidence: Vec<String>) -> Vec<String> {
    evidence.truncate(MAX_EXAMPLES);
    evidence
}

/// ルールチェッカーの共通契約
///
/// 3つのレベルのチェッカーはすべて同一のインターフェースを実装し、
/// 参照する構造・値シグナルだけが異なります。評価はルールごとに独立で、
/// ルールセットに含まれる該当レベルのルールすべてが必ず評価されます。
pub trait Checker {
    /// このチェッカーが担当するレベル
    fn level(&self) -> CheckLevel;

    /// 指定ルールセットの担当レベル分を評価し、ID昇順の結果を返す
    fn check(&self, tables: &[Table], ruleset: &RuleSet) -> Vec<CheckResult>;
}

/// レベルに対応するチェッカーを生成するファクトリー
pub(crate) fn checker_for(level: CheckLevel) -> Box<dyn Checker> {
    match level {
        CheckLevel::Level1 => Box::new(Level1Checker),
        CheckLevel::Level2 => Box::new(Level2Checker),
        CheckLevel::Level3 => Box::new(Level3Checker),
    }
}

/// 評価関数が未実装のルールに対する結果（レジストリ検証の最終防壁）
pub(crate) fn no_evaluator(rule: &Rule) -> CheckResult {
    CheckResult {
        rule_id: rule.id.clone(),
        level: rule.level,
        status: CheckStatus::Warning,
        message: format!("ルール '{}' の評価関数が実装されていません", rule.id),
        evidence: Vec::new(),
    }
}

/// シート名とセル座標を結合した証拠文字列を生成
pub(crate) fn cell_evidence(sheet_name: &str, coord: crate::types::CellCoord) -> String {
    format!("{}!{}", sheet_name, coord.to_a1_notation())
}
