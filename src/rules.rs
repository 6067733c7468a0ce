//! Rules Module
//!
//! 外部設定として読み込まれるルール定義を表現するモジュール。
//! ルールセットは読み込み時に検証される不変の値オブジェクトであり、
//! 各診断実行に明示的なパラメータとして渡されます。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::KaidokuError;

/// チェックレベル（1〜3の3段階）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum CheckLevel {
    /// レベル1: ファイル形式と構造の健全性
    Level1,

    /// レベル2: データ構造と値の妥当性
    Level2,

    /// レベル3: メタデータ・ドキュメントの充実度
    Level3,
}

impl CheckLevel {
    /// すべてのレベル（昇順）
    pub fn all() -> [CheckLevel; 3] {
        [CheckLevel::Level1, CheckLevel::Level2, CheckLevel::Level3]
    }

    /// レベル番号（1始まり）
    pub fn as_number(&self) -> u8 {
        match self {
            CheckLevel::Level1 => 1,
            CheckLevel::Level2 => 2,
            CheckLevel::Level3 => 3,
        }
    }
}

impl TryFrom<u8> for CheckLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CheckLevel::Level1),
            2 => Ok(CheckLevel::Level2),
            3 => Ok(CheckLevel::Level3),
            other => Err(format!("invalid check level: {}", other)),
        }
    }
}

impl From<CheckLevel> for u8 {
    fn from(level: CheckLevel) -> Self {
        level.as_number()
    }
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Level{}", self.as_number())
    }
}

/// ルール違反の深刻度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 違反は不合格（Fail）として報告される
    Error,

    /// 違反は警告（Warning）として報告される
    Warning,
}

/// ルールのチューニングパラメータ
///
/// 判定しきい値はアルゴリズムに埋め込まず、ルールセットの設定として
/// 公開します。省略されたフィールドにはデフォルト値が適用されます。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleParams {
    /// 書式による意味づけ判定の相関しきい値
    /// （列内の書式付き/書式なしセルの少数派割合がこの値以上で違反）
    pub format_ratio_threshold: f64,

    /// 列を数値列とみなす、数値らしい値の割合のしきい値
    pub numeric_ratio_threshold: f64,

    /// 数値列に許容される非数値値の割合
    pub numeric_outlier_tolerance: f64,

    /// 選択肢（カテゴリカル）列とみなす、異なり値数の上限
    pub max_categories: usize,

    /// 自由記述とみなす文字数の下限
    pub free_text_min_len: usize,

    /// 文書メタデータとして必須のフィールド名リスト
    pub required_metadata_fields: Vec<String>,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            format_ratio_threshold: 0.1,
            numeric_ratio_threshold: 0.8,
            numeric_outlier_tolerance: 0.0,
            max_categories: 10,
            free_text_min_len: 20,
            required_metadata_fields: vec![
                "title".to_string(),
                "source".to_string(),
                "unit".to_string(),
                "date".to_string(),
            ],
        }
    }
}

/// 1件のルール定義
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// ルールID（例: "L1-03"）
    pub id: String,

    /// 所属レベル
    pub level: CheckLevel,

    /// 人間可読の説明
    pub description: String,

    /// 深刻度
    pub severity: Severity,

    /// チューニングパラメータ
    #[serde(default)]
    pub parameters: RuleParams,
}

/// 実装済みルールIDのレジストリ
///
/// ルールセットが参照できるのはここに列挙されたIDだけです。
/// 未知のIDは読み込み時に`Config`エラーで拒否されます。
const KNOWN_RULES: &[(&str, CheckLevel)] = &[
    ("L1-01", CheckLevel::Level1),
    ("L1-02", CheckLevel::Level1),
    ("L1-03", CheckLevel::Level1),
    ("L1-04", CheckLevel::Level1),
    ("L1-05", CheckLevel::Level1),
    ("L1-06", CheckLevel::Level1),
    ("L1-07", CheckLevel::Level1),
    ("L1-08", CheckLevel::Level1),
    ("L1-09", CheckLevel::Level1),
    ("L1-10", CheckLevel::Level1),
    ("L2-01", CheckLevel::Level2),
    ("L2-02", CheckLevel::Level2),
    ("L2-03", CheckLevel::Level2),
    ("L2-04", CheckLevel::Level2),
    ("L3-01", CheckLevel::Level3),
    ("L3-02", CheckLevel::Level3),
    ("L3-03", CheckLevel::Level3),
];

/// 検証済みの不変ルールセット
///
/// ルールは（レベル, ID）の昇順に保持され、レベル内の評価順序を
/// 決定します。
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// JSON文字列からルールセットを読み込む
    ///
    /// # 形式
    ///
    /// ```json
    /// [
    ///   {"id": "L1-03", "level": 1, "description": "結合セルがないこと",
    ///    "severity": "error", "parameters": {}}
    /// ]
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, KaidokuError> {
        let rules: Vec<Rule> = serde_json::from_str(json)
            .map_err(|e| KaidokuError::Config(format!("invalid rule definition: {}", e)))?;
        Self::from_rules(rules)
    }

    /// JSONファイルからルールセットを読み込む
    pub fn from_path(path: &Path) -> Result<Self, KaidokuError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// ルールのリストから検証済みルールセットを構築
    pub fn from_rules(mut rules: Vec<Rule>) -> Result<Self, KaidokuError> {
        Self::validate(&rules)?;
        rules.sort_by(|a, b| (a.level, &a.id).cmp(&(b.level, &b.id)));
        Ok(Self { rules })
    }

    /// 組み込みのデフォルトルールセット
    ///
    /// 全17ルールをデフォルトパラメータで有効化したものです。
    pub fn builtin() -> Self {
        let rule = |id: &str, level: CheckLevel, description: &str| Rule {
            id: id.to_string(),
            level,
            description: description.to_string(),
            severity: Severity::Error,
            parameters: RuleParams::default(),
        };

        let rules = vec![
            rule("L1-01", CheckLevel::Level1, "ファイル形式がCSVまたはExcelであること"),
            rule("L1-02", CheckLevel::Level1, "画像・図形などのオブジェクトが含まれていないこと"),
            rule("L1-03", CheckLevel::Level1, "結合セルがないこと"),
            rule("L1-04", CheckLevel::Level1, "書式（塗りつぶし・太字）によるデータの意味づけがないこと"),
            rule("L1-05", CheckLevel::Level1, "1シートに1つの表のみであること"),
            rule("L1-06", CheckLevel::Level1, "非表示の行・列がないこと"),
            rule("L1-07", CheckLevel::Level1, "1セルに1データのみであること"),
            rule("L1-08", CheckLevel::Level1, "スペースや改行による整形がないこと"),
            rule("L1-09", CheckLevel::Level1, "表の外に注記・備考がないこと"),
            rule("L1-10", CheckLevel::Level1, "機種依存文字が含まれていないこと"),
            rule("L2-01", CheckLevel::Level2, "数値列に数値以外のデータが混入していないこと"),
            rule("L2-02", CheckLevel::Level2, "自由記述が選択肢の列と分離されていること"),
            rule("L2-03", CheckLevel::Level2, "すべての列に一意で意味のある項目名があること"),
            rule("L2-04", CheckLevel::Level2, "欠損値の表現が列内で一貫していること"),
            rule("L3-01", CheckLevel::Level3, "選択肢に対応するコード表が存在すること"),
            rule("L3-02", CheckLevel::Level3, "全項目を記載した設問・変数定義表が存在すること"),
            rule("L3-03", CheckLevel::Level3, "タイトル・出典・単位・日付などのメタ情報が揃っていること"),
        ];

        // レジストリ由来のIDのみで構成されているため、検証は常に成功する
        Self {
            rules,
        }
    }

    /// 指定レベルのルールをID昇順で返す
    pub fn rules_for_level(&self, level: CheckLevel) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.level == level).collect()
    }

    /// IDでルールを検索
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// ルール総数
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// ルールが空かどうか
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 読み込み時の検証
    ///
    /// - IDが一意であること
    /// - IDがレジストリに存在すること
    /// - 宣言されたレベルがレジストリと一致すること
    fn validate(rules: &[Rule]) -> Result<(), KaidokuError> {
        let mut seen = std::collections::HashSet::new();
        for rule in rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(KaidokuError::Config(format!(
                    "duplicate rule id: {}",
                    rule.id
                )));
            }

            match KNOWN_RULES.iter().find(|(id, _)| *id == rule.id) {
                None => {
                    return Err(KaidokuError::Config(format!(
                        "unknown rule id: {}",
                        rule.id
                    )));
                }
                Some((_, expected_level)) if *expected_level != rule.level => {
                    return Err(KaidokuError::Config(format!(
                        "rule {} declares level {} but belongs to {}",
                        rule.id, rule.level, expected_level
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // CheckLevel のテスト
    #[test]
    fn test_check_level_ordering() {
        assert!(CheckLevel::Level1 < CheckLevel::Level2);
        assert!(CheckLevel::Level2 < CheckLevel::Level3);
        assert_eq!(CheckLevel::all().len(), 3);
    }

    #[test]
    fn test_check_level_from_u8() {
        assert_eq!(CheckLevel::try_from(1u8).unwrap(), CheckLevel::Level1);
        assert_eq!(CheckLevel::try_from(3u8).unwrap(), CheckLevel::Level3);
        assert!(CheckLevel::try_from(0u8).is_err());
        assert!(CheckLevel::try_from(4u8).is_err());
    }

    // builtin のテスト
    #[test]
    fn test_builtin_ruleset_complete() {
        let ruleset = RuleSet::builtin();
        assert_eq!(ruleset.len(), 17);
        assert_eq!(ruleset.rules_for_level(CheckLevel::Level1).len(), 10);
        assert_eq!(ruleset.rules_for_level(CheckLevel::Level2).len(), 4);
        assert_eq!(ruleset.rules_for_level(CheckLevel::Level3).len(), 3);
    }

    #[test]
    fn test_builtin_rules_sorted_by_id() {
        let ruleset = RuleSet::builtin();
        let level1 = ruleset.rules_for_level(CheckLevel::Level1);
        let ids: Vec<&str> = level1.iter().map(|r| r.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    // JSON読み込みのテスト
    #[test]
    fn test_from_json_str() {
        let json = r#"[
            {"id": "L1-03", "level": 1, "description": "結合セルがないこと",
             "severity": "error"},
            {"id": "L2-04", "level": 2, "description": "欠損値の一貫性",
             "severity": "warning",
             "parameters": {"max_categories": 5}}
        ]"#;
        let ruleset = RuleSet::from_json_str(json).unwrap();
        assert_eq!(ruleset.len(), 2);

        let rule = ruleset.rule("L2-04").unwrap();
        assert_eq!(rule.severity, Severity::Warning);
        assert_eq!(rule.parameters.max_categories, 5);
        // 省略されたパラメータはデフォルト値
        assert_eq!(rule.parameters.numeric_ratio_threshold, 0.8);
    }

    #[test]
    fn test_unknown_rule_id_rejected() {
        let json = r#"[{"id": "L9-99", "level": 1, "description": "x", "severity": "error"}]"#;
        let result = RuleSet::from_json_str(json);
        assert!(matches!(result, Err(KaidokuError::Config(_))));
    }

    #[test]
    fn test_duplicate_rule_id_rejected() {
        let json = r#"[
            {"id": "L1-03", "level": 1, "description": "a", "severity": "error"},
            {"id": "L1-03", "level": 1, "description": "b", "severity": "error"}
        ]"#;
        let result = RuleSet::from_json_str(json);
        assert!(matches!(result, Err(KaidokuError::Config(_))));
    }

    #[test]
    fn test_mismatched_level_rejected() {
        let json = r#"[{"id": "L1-03", "level": 2, "description": "x", "severity": "error"}]"#;
        let result = RuleSet::from_json_str(json);
        assert!(matches!(result, Err(KaidokuError::Config(_))));
    }

    #[test]
    fn test_invalid_level_number_rejected() {
        let json = r#"[{"id": "L1-03", "level": 7, "description": "x", "severity": "error"}]"#;
        let result = RuleSet::from_json_str(json);
        assert!(matches!(result, Err(KaidokuError::Config(_))));
    }

    #[test]
    fn test_rules_sorted_after_load() {
        let json = r#"[
            {"id": "L1-07", "level": 1, "description": "b", "severity": "error"},
            {"id": "L1-03", "level": 1, "description": "a", "severity": "error"}
        ]"#;
        let ruleset = RuleSet::from_json_str(json).unwrap();
        let ids: Vec<&str> = ruleset
            .rules_for_level(CheckLevel::Level1)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["L1-03", "L1-07"]);
    }
}
