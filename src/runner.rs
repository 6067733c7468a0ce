//! Runner Module
//!
//! ローダー → アダプター → テーブルパーサー → 各レベルのチェッカー →
//! 集約という診断パイプラインを逐次実行するモジュール。
//! Fluent Builder APIで`Diagnostics`インスタンスを段階的に構築します。
//! 実行は明示的な状態機械で追跡され、ファイルレベルルールの不合格
//! （構造が読めない場合）のみが後続レベルの評価を打ち切ります。

use encoding_rs::Encoding;
use std::path::Path;

use crate::check::{checker_for, CheckResult, CheckStatus};
use crate::error::KaidokuError;
use crate::limits::ResourceLimits;
use crate::loader::{default_encodings, Loader};
use crate::report::{aggregate, DiagnosticReport};
use crate::rules::{CheckLevel, RuleSet};
use crate::table::parse_tables;

/// 後続レベルの評価を打ち切るファイルレベルルールのID
///
/// 形式・構造の妥当性が崩れている場合、レベル2・3の評価には
/// 意味がありません。それ以外のルールの不合格は後続レベルの
/// 評価を妨げません。
const FILE_LEVEL_RULE_ID: &str = "L1-01";

/// 診断実行の状態機械
///
/// 遷移: NotStarted → Level1Done → Level2Done → Level3Done → Aggregated。
/// ファイルレベルルールの不合格時のみAbortedに遷移し、未実行レベルを
/// スキップして集約に進みます。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    NotStarted,
    Level1Done,
    Level2Done,
    Level3Done,
    Aggregated,
    Aborted,
}

impl RunState {
    /// 指定レベル完了後の状態
    fn after(level: CheckLevel) -> Self {
        match level {
            CheckLevel::Level1 => RunState::Level1Done,
            CheckLevel::Level2 => RunState::Level2Done,
            CheckLevel::Level3 => RunState::Level3Done,
        }
    }
}

/// 診断実行の設定を保持する内部構造体
#[derive(Debug, Clone)]
struct DiagnosticsConfig {
    /// 実行するチェックレベル（昇順・重複なし）
    levels: Vec<CheckLevel>,

    /// 使用するルールセット
    ruleset: RuleSet,

    /// 資源上限
    limits: ResourceLimits,

    /// CSVエンコーディングの候補リスト（優先順）
    encodings: Vec<&'static Encoding>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            levels: CheckLevel::all().to_vec(),
            ruleset: RuleSet::builtin(),
            limits: ResourceLimits::default(),
            encodings: default_encodings(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Diagnostics`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみを
/// オーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use kaidoku::{CheckLevel, DiagnosticsBuilder};
///
/// # fn main() -> Result<(), kaidoku::KaidokuError> {
/// let diagnostics = DiagnosticsBuilder::new()
///     .with_levels(&[CheckLevel::Level1, CheckLevel::Level2])
///     .build()?;
/// let report = diagnostics.run(std::path::Path::new("survey.xlsx"))?;
/// println!("{}", report.to_json()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DiagnosticsBuilder {
    /// 内部設定（構築中）
    config: DiagnosticsConfig,
}

impl Default for DiagnosticsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - チェックレベル: 1〜3すべて
    /// - ルールセット: 組み込みデフォルト（全17ルール）
    /// - 資源上限: `ResourceLimits::default()`
    /// - エンコーディング候補: UTF-8 → Shift_JIS → EUC-JP
    pub fn new() -> Self {
        Self {
            config: DiagnosticsConfig::default(),
        }
    }

    /// 実行するチェックレベルを指定する
    ///
    /// 重複は取り除かれ、昇順に実行されます。
    pub fn with_levels(mut self, levels: &[CheckLevel]) -> Self {
        self.config.levels = levels.to_vec();
        self
    }

    /// 使用するルールセットを指定する
    pub fn with_ruleset(mut self, ruleset: RuleSet) -> Self {
        self.config.ruleset = ruleset;
        self
    }

    /// 資源上限を指定する
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// CSVエンコーディングの候補リストを優先順に指定する
    pub fn with_encodings(mut self, encodings: Vec<&'static Encoding>) -> Self {
        self.config.encodings = encodings;
        self
    }

    /// 設定を検証し、`Diagnostics`インスタンスを構築する
    ///
    /// # エラー
    ///
    /// * `KaidokuError::Config` - チェックレベルまたはエンコーディング
    ///   候補が空の場合
    pub fn build(mut self) -> Result<Diagnostics, KaidokuError> {
        if self.config.levels.is_empty() {
            return Err(KaidokuError::Config(
                "at least one check level is required".to_string(),
            ));
        }
        if self.config.encodings.is_empty() {
            return Err(KaidokuError::Config(
                "at least one encoding candidate is required".to_string(),
            ));
        }

        self.config.levels.sort_unstable();
        self.config.levels.dedup();

        Ok(Diagnostics {
            config: self.config,
        })
    }
}

/// 機械可読性診断の実行器
///
/// 1回の`run`呼び出しが1回の診断実行に対応します。実行ごとに
/// アダプター・テーブル・レポートを専有するため、`Diagnostics`自体は
/// 複数の実行で再利用できます。
pub struct Diagnostics {
    config: DiagnosticsConfig,
}

impl Diagnostics {
    /// ファイルを診断し、レポートを返す
    pub fn run(&self, path: &Path) -> Result<DiagnosticReport, KaidokuError> {
        let bytes = std::fs::read(path)?;
        let display_name = path.to_string_lossy().into_owned();
        self.run_bytes(bytes, &display_name)
    }

    /// バイト列を診断し、レポートを返す
    ///
    /// # 引数
    ///
    /// * `bytes` - 入力ファイルの全内容
    /// * `display_name` - レポートとエラー文脈に使用するファイル名
    pub fn run_bytes(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
    ) -> Result<DiagnosticReport, KaidokuError> {
        tracing::info!(file = display_name, "diagnostic run started");

        // 1. ローダー → アダプター → テーブルパーサー（1回だけ解決）
        let loader = Loader::new(self.config.limits.clone(), self.config.encodings.clone());
        let mut adapter = loader.load_bytes(bytes, display_name)?;
        let file_format = adapter.file_format();
        let tables = parse_tables(adapter.as_mut(), &self.config.limits)?;

        let truncated_sheets: Vec<String> = tables
            .iter()
            .filter(|t| t.truncated)
            .map(|t| t.sheet_name.clone())
            .collect();

        // 2. 要求されたレベルを昇順に実行
        let mut state = RunState::NotStarted;
        let mut per_level: Vec<(CheckLevel, Vec<CheckResult>)> = Vec::new();

        for &level in &self.config.levels {
            if state == RunState::Aborted {
                break;
            }

            let checker = checker_for(level);
            let results = checker.check(&tables, &self.config.ruleset);
            let file_level_failed = level == CheckLevel::Level1
                && results
                    .iter()
                    .any(|r| r.rule_id == FILE_LEVEL_RULE_ID && r.status == CheckStatus::Fail);

            tracing::debug!(level = %level, results = results.len(), "level evaluated");
            per_level.push((level, results));

            state = if file_level_failed {
                tracing::warn!(
                    file = display_name,
                    "file-level rule failed; skipping later levels"
                );
                RunState::Aborted
            } else {
                RunState::after(level)
            };
        }

        // 3. 集約
        let report = aggregate(
            display_name.to_string(),
            file_format,
            per_level,
            truncated_sheets,
        );
        let final_state = if state == RunState::Aborted {
            RunState::Aborted
        } else {
            RunState::Aggregated
        };
        tracing::info!(
            file = display_name,
            state = ?final_state,
            fail = report.totals.fail,
            warning = report.totals.warning,
            "diagnostic run finished"
        );

        Ok(report)
    }
}
