//! Narrative Module
//!
//! 診断レポートに対する自由記述の講評を生成する外部コラボレーター
//! （LLMクライアントなど）との接合点。クレート自体はネットワーク
//! クライアントを同梱せず、講評がなくてもレポートは完全かつ有効です。

use crate::check::CheckStatus;
use crate::report::DiagnosticReport;

/// 講評生成クライアントのインターフェース
///
/// 実装は診断レポート（またはそのシリアライズ済みサマリー）を受け取り、
/// 自由記述の講評を返します。失敗やタイムアウトは診断実行を失敗させず、
/// 「講評なし」への格下げとして扱われます。
pub trait NarrativeClient {
    /// レポートに対する講評を生成
    ///
    /// # 戻り値
    ///
    /// * `Ok(String)` - 生成された講評テキスト
    /// * `Err(String)` - 生成に失敗した場合の理由（レポート自体は有効なまま）
    fn summarize(&self, report: &DiagnosticReport) -> Result<String, String>;
}

/// レポートに講評を付与する
///
/// クライアントの失敗は講評の省略に格下げされ、決してエラーに
/// なりません。
pub fn attach_narrative(report: &mut DiagnosticReport, client: &dyn NarrativeClient) {
    match client.summarize(report) {
        Ok(text) => report.narrative = Some(text),
        Err(reason) => {
            tracing::warn!(reason = %reason, "narrative omitted");
            report.narrative = None;
        }
    }
}

/// レポートのテキストダイジェストを生成
///
/// 講評クライアントへの入力や簡易表示に使える、レベル別の集計表と
/// ルール別の合否一覧です。
pub fn plain_text_digest(report: &DiagnosticReport) -> String {
    let mut lines = Vec::new();

    lines.push("| チェックレベル | 合格数 | 全体数 | 合格率 |".to_string());
    lines.push("|----------------|--------|--------|--------|".to_string());
    for summary in &report.levels {
        let total = summary.counts.total();
        let rate = if total > 0 {
            format!("{:.0}%", summary.counts.pass as f64 / total as f64 * 100.0)
        } else {
            "N/A".to_string()
        };
        lines.push(format!(
            "| {} | {} | {} | {} |",
            summary.level, summary.counts.pass, total, rate
        ));
    }

    for summary in &report.levels {
        lines.push(format!("【{}】", summary.level));
        for result in &summary.results {
            let mark = match result.status {
                CheckStatus::Pass => "OK",
                CheckStatus::Fail => "NG",
                CheckStatus::Warning => "注意",
                CheckStatus::NotApplicable => "対象外",
            };
            lines.push(format!("{}: {} ({})", result.rule_id, mark, result.message));
        }
    }

    lines.join("\n")
}
