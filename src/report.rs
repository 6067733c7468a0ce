//! Report Module
//!
//! レベル別のチェック結果を1つの診断レポートに集約するモジュール。
//! 集約は純粋関数であり、同じ入力に対して決定的な結果を返します。
//! レポートは集約後に変更されない不変の値として外部に公開されます。

use serde::Serialize;

use crate::check::{CheckResult, CheckStatus};
use crate::error::KaidokuError;
use crate::rules::CheckLevel;
use crate::types::FileFormat;

/// ステータス別の件数集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// 合格数
    pub pass: usize,

    /// 不合格数
    pub fail: usize,

    /// 警告数
    pub warning: usize,

    /// 適用対象外数
    pub not_applicable: usize,
}

impl StatusCounts {
    /// 結果リストから集計
    pub fn tally(results: &[CheckResult]) -> Self {
        let mut counts = Self::default();
        for result in results {
            counts.add(result.status);
        }
        counts
    }

    /// 1件を加算
    fn add(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Pass => self.pass += 1,
            CheckStatus::Fail => self.fail += 1,
            CheckStatus::Warning => self.warning += 1,
            CheckStatus::NotApplicable => self.not_applicable += 1,
        }
    }

    /// 総件数
    pub fn total(&self) -> usize {
        self.pass + self.fail + self.warning + self.not_applicable
    }

    /// 2つの集計を合算
    fn merge(&self, other: &Self) -> Self {
        Self {
            pass: self.pass + other.pass,
            fail: self.fail + other.fail,
            warning: self.warning + other.warning,
            not_applicable: self.not_applicable + other.not_applicable,
        }
    }
}

/// 1レベル分のチェック結果サマリー
#[derive(Debug, Clone, Serialize)]
pub struct LevelSummary {
    /// チェックレベル
    pub level: CheckLevel,

    /// ステータス別件数
    pub counts: StatusCounts,

    /// ルールID昇順のチェック結果
    pub results: Vec<CheckResult>,
}

/// 診断レポート
///
/// 1回の診断実行の唯一の成果物です。要求されたすべてのレベルの
/// 結果が揃った完全な状態でのみ生成され、部分的なレポートが外部に
/// 公開されることはありません。
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    /// 入力ファイルの表示名
    pub source_name: String,

    /// 判定されたファイル形式
    pub file_format: FileFormat,

    /// レポート生成時刻（RFC 3339）
    pub generated_at: String,

    /// レベル昇順のサマリー
    pub levels: Vec<LevelSummary>,

    /// 全レベル合算のステータス別件数
    pub totals: StatusCounts,

    /// 行数上限で切り詰められたシート名
    pub truncated_sheets: Vec<String>,

    /// LLMによる講評（外部コラボレーター、省略可）
    pub narrative: Option<String>,
}

impl DiagnosticReport {
    /// レポートをJSON文字列にシリアライズ
    ///
    /// UIレンダラーやLLMクライアントなど外部コラボレーターへの
    /// 受け渡しに使用します。
    pub fn to_json(&self) -> Result<String, KaidokuError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 不合格が1件もないかどうか
    pub fn is_all_clear(&self) -> bool {
        self.totals.fail == 0
    }
}

/// レベル別結果を診断レポートに集約
///
/// 純粋関数です。結果の順序を保持したままレベルごとにグループ化し、
/// ステータス別の件数を計算します。
pub(crate) fn aggregate(
    source_name: String,
    file_format: FileFormat,
    per_level: Vec<(CheckLevel, Vec<CheckResult>)>,
    truncated_sheets: Vec<String>,
) -> DiagnosticReport {
    let levels: Vec<LevelSummary> = per_level
        .into_iter()
        .map(|(level, results)| LevelSummary {
            level,
            counts: StatusCounts::tally(&results),
            results,
        })
        .collect();

    let totals = levels
        .iter()
        .fold(StatusCounts::default(), |acc, summary| {
            acc.merge(&summary.counts)
        });

    DiagnosticReport {
        source_name,
        file_format,
        generated_at: chrono::Utc::now().to_rfc3339(),
        levels,
        totals,
        truncated_sheets,
        narrative: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rule, RuleParams, Severity};

    fn result(id: &str, level: CheckLevel, status: CheckStatus) -> CheckResult {
        let rule = Rule {
            id: id.to_string(),
            level,
            description: String::new(),
            severity: Severity::Error,
            parameters: RuleParams::default(),
        };
        match status {
            CheckStatus::Pass => CheckResult::pass(&rule, "ok"),
            CheckStatus::Fail => CheckResult::violation(&rule, "ng", Vec::new()),
            CheckStatus::Warning => CheckResult::warning(&rule, "warn", Vec::new()),
            CheckStatus::NotApplicable => CheckResult::not_applicable(&rule, "n/a"),
        }
    }

    #[test]
    fn test_tally() {
        let results = vec![
            result("L1-01", CheckLevel::Level1, CheckStatus::Pass),
            result("L1-02", CheckLevel::Level1, CheckStatus::Fail),
            result("L1-03", CheckLevel::Level1, CheckStatus::Warning),
            result("L1-05", CheckLevel::Level1, CheckStatus::Pass),
        ];
        let counts = StatusCounts::tally(&results);
        assert_eq!(counts.pass, 2);
        assert_eq!(counts.fail, 1);
        assert_eq!(counts.warning, 1);
        assert_eq!(counts.not_applicable, 0);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_aggregate_preserves_order_and_counts() {
        let per_level = vec![
            (
                CheckLevel::Level1,
                vec![
                    result("L1-01", CheckLevel::Level1, CheckStatus::Pass),
                    result("L1-03", CheckLevel::Level1, CheckStatus::Fail),
                ],
            ),
            (
                CheckLevel::Level2,
                vec![result("L2-01", CheckLevel::Level2, CheckStatus::NotApplicable)],
            ),
        ];

        let report = aggregate(
            "survey.csv".to_string(),
            FileFormat::Csv,
            per_level,
            Vec::new(),
        );

        assert_eq!(report.levels.len(), 2);
        assert_eq!(report.levels[0].results[0].rule_id, "L1-01");
        assert_eq!(report.levels[0].results[1].rule_id, "L1-03");
        assert_eq!(report.totals.pass, 1);
        assert_eq!(report.totals.fail, 1);
        assert_eq!(report.totals.not_applicable, 1);
        assert!(report.narrative.is_none());
        assert!(!report.is_all_clear());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = aggregate(
            "survey.csv".to_string(),
            FileFormat::Csv,
            vec![(
                CheckLevel::Level1,
                vec![result("L1-01", CheckLevel::Level1, CheckStatus::Pass)],
            )],
            vec!["CSV".to_string()],
        );

        let json = report.to_json().unwrap();
        assert!(json.contains("\"source_name\": \"survey.csv\""));
        assert!(json.contains("\"rule_id\": \"L1-01\""));
        assert!(json.contains("\"truncated_sheets\""));
    }
}
