//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// kaidokuクレート全体で使用するエラー型
///
/// 診断実行を中断させる条件のみをエラーとして表現します。
/// フォーマット能力の欠如（CapabilityGap）や曖昧な証拠による
/// 判定の格下げはエラーではなく、個別ルール結果の`Warning`として
/// 扱われます（`check`モジュールを参照）。
///
/// # エラーの種類
///
/// - `Io`: I/O操作中に発生したエラー（ファイル読み込み失敗など）
/// - `Parse`: ワークブックの解析中に発生したエラー（calamine由来）
/// - `UnsupportedFormat`: 拡張子・内容のいずれからも形式を特定できない
/// - `UnsupportedEncoding`: CSVをどの候補エンコーディングでも復号できない
/// - `StructuralParse`: アダプターが最低限のシート構造を構築できない
/// - `Config`: ビルダー設定またはルールセットの検証に失敗した
/// - `ResourceLimit`: アーカイブサイズ等の資源上限を超過した
#[derive(Error, Debug)]
pub enum KaidokuError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ワークブックの解析中に発生したエラー
    ///
    /// calamineクレートがXLS/XLSXファイルを解析する際に発生したエラーです。
    /// 破損したファイル、不正なコンテナ構造などが原因となります。
    #[error("Failed to parse workbook: {0}")]
    Parse(#[from] calamine::Error),

    /// UTF-8文字列の変換エラー
    ///
    /// XML解析時にUTF-8文字列への変換に失敗した場合に発生します。
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// ZIPアーカイブの解析エラー
    ///
    /// XLSXファイル（ZIPアーカイブ）の解析中に発生したエラーです。
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// 数値の解析エラー
    ///
    /// XML属性値から数値への変換に失敗した場合に発生します。
    #[error("Number parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// JSONのシリアライズ・デシリアライズエラー
    ///
    /// 診断レポートのシリアライズに失敗した場合に発生します。
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// サポート外のファイル形式
    ///
    /// 拡張子とコンテンツスニッフィングのいずれでも、対応する
    /// アダプター（CSV / XLS / XLSX）を特定できなかった場合に発生します。
    /// 診断実行は解析前に中断されます。
    #[error("Unsupported file format for '{path}': {detail}")]
    UnsupportedFormat {
        /// 対象ファイルのパスまたは表示名
        path: String,
        /// 判定できなかった理由
        detail: String,
    },

    /// サポート外のテキストエンコーディング
    ///
    /// CSVファイルを候補エンコーディングリストのどれでも
    /// 完全に復号できなかった場合に発生します。
    #[error("No candidate encoding could decode '{path}' (tried: {tried})")]
    UnsupportedEncoding {
        /// 対象ファイルのパスまたは表示名
        path: String,
        /// 試行したエンコーディング名のカンマ区切りリスト
        tried: String,
    },

    /// 構造解析の失敗
    ///
    /// アダプターが最低限有効なシート・行構造を構築できなかった場合に
    /// 発生します。部分的な診断レポートは生成されません。
    #[error("Structural parse failure in '{path}' at stage {stage}: {message}")]
    StructuralParse {
        /// 対象ファイルのパスまたは表示名
        path: String,
        /// 失敗した処理ステージ（"load"、"sheet"など）
        stage: String,
        /// エラーの詳細メッセージ
        message: String,
    },

    /// 設定の検証に失敗したエラー
    ///
    /// `DiagnosticsBuilder::build()`時の設定検証、またはルールセットの
    /// 読み込み時検証で無効な値が検出された場合に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 資源上限の超過
    ///
    /// 入力ファイルサイズ、アーカイブ内ファイル数、展開後サイズなどの
    /// 上限（`ResourceLimits`）に違反した場合に発生します。
    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),
}
