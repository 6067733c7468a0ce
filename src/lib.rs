//! kaidoku - Machine-readability diagnostics for spreadsheet files
//!
//! このクレートは、表形式ファイル（CSV / XLS / XLSX）を機械可読性の
//! 多段階チェックリストに照らして検査し、構造化された診断レポートを
//! 生成します。3つの互いに非互換な形式を単一の正規化テーブル表現に
//! 吸収する形式抽象層（能力インターフェース + 3つのアダプター）が中核で、
//! ルールチェッカーは元のファイル形式を一切知らずに動作します。
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use kaidoku::DiagnosticsBuilder;
//!
//! fn main() -> Result<(), kaidoku::KaidokuError> {
//!     // デフォルト設定（全レベル・組み込みルールセット）で診断器を構築
//!     let diagnostics = DiagnosticsBuilder::new().build()?;
//!
//!     // ファイルを診断
//!     let report = diagnostics.run(Path::new("survey.xlsx"))?;
//!
//!     // レポートはJSONとして外部コラボレーターに渡せる
//!     println!("{}", report.to_json()?);
//!
//!     Ok(())
//! }
//! ```
//!
//! # レベルを絞った実行
//!
//! ```rust,no_run
//! use kaidoku::{CheckLevel, DiagnosticsBuilder};
//!
//! # fn main() -> Result<(), kaidoku::KaidokuError> {
//! let diagnostics = DiagnosticsBuilder::new()
//!     .with_levels(&[CheckLevel::Level1])
//!     .build()?;
//! let report = diagnostics.run_bytes(b"name,age\nAlice,30\n".to_vec(), "upload.csv")?;
//! assert!(report.is_all_clear());
//! # Ok(())
//! # }
//! ```
//!
//! # カスタムルールセット
//!
//! ルール定義は外部設定として読み込まれ、検証済みの不変値として
//! 各実行に渡されます。
//!
//! ```rust,no_run
//! use kaidoku::{DiagnosticsBuilder, RuleSet};
//!
//! # fn main() -> Result<(), kaidoku::KaidokuError> {
//! let json = r#"[
//!   {"id": "L1-03", "level": 1, "description": "結合セルがないこと",
//!    "severity": "error"}
//! ]"#;
//! let diagnostics = DiagnosticsBuilder::new()
//!     .with_ruleset(RuleSet::from_json_str(json)?)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod check;
mod error;
mod limits;
mod loader;
mod narrative;
mod report;
mod rules;
mod runner;
mod table;
mod types;

// 公開API
pub use adapter::{CsvAdapter, FormatAdapter, XlsAdapter, XlsxAdapter};
pub use check::{CheckResult, CheckStatus, Checker, Level1Checker, Level2Checker, Level3Checker};
pub use error::KaidokuError;
pub use limits::ResourceLimits;
pub use loader::Loader;
pub use narrative::{attach_narrative, plain_text_digest, NarrativeClient};
pub use report::{DiagnosticReport, LevelSummary, StatusCounts};
pub use rules::{CheckLevel, Rule, RuleParams, RuleSet, Severity};
pub use runner::{Diagnostics, DiagnosticsBuilder};
pub use table::{parse_tables, Cell, Table};
pub use types::{Capability, CellCoord, CellRange, CellStyle, CellValue, FileFormat, MergedRegion};
