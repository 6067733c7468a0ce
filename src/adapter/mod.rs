//! Format Adapter Module
//!
//! 3つの入力形式（CSV / XLS / XLSX）を共通の能力インターフェースで
//! 抽象化するモジュール。チェッカーがファイル形式を一切知らずに済むよう、
//! すべての構造クエリは`Capability`で応答します。

mod csv;
mod structure;
mod xls;
mod xlsx;

pub use self::csv::CsvAdapter;
pub use self::xls::XlsAdapter;
pub use self::xlsx::XlsxAdapter;

use std::collections::HashMap;

use crate::error::KaidokuError;
use crate::types::{Capability, CellCoord, CellStyle, CellValue, FileFormat, MergedRegion};

/// フォーマットアダプターの共通能力インターフェース
///
/// 各アダプターは形式固有の解析済み構造をラップし、シート一覧・セル値・
/// 構造メタデータ（結合セル、非表示行/列、埋め込みオブジェクト、セル書式）
/// への問い合わせに答えます。元形式が表現できない情報への問い合わせには
/// 既定値ではなく`Capability::Unsupported`を返します。呼び出し側
/// （チェッカー）はこのマーカーを処理し、該当ルールの判定を
/// 「検証不可の警告」に格下げする義務を負います。
///
/// シートは0始まりのインデックスで参照し、範囲外のインデックスは
/// 既定値ではなく`KaidokuError::Config`で失敗します。
pub trait FormatAdapter {
    /// アダプターが宣言するファイル形式
    fn file_format(&self) -> FileFormat;

    /// すべてのシート名（ワークブック定義順）
    fn sheet_names(&self) -> &[String];

    /// 指定シートの非空セルを疎なリストとして取得
    ///
    /// 座標はシート左上からの絶対位置（0始まり）です。
    fn sheet_cells(
        &mut self,
        index: usize,
    ) -> Result<Vec<(CellCoord, CellValue)>, KaidokuError>;

    /// 指定シートのセル結合範囲のリスト
    fn merged_regions(
        &mut self,
        index: usize,
    ) -> Result<Capability<Vec<MergedRegion>>, KaidokuError>;

    /// 指定シートの非表示行インデックス（0始まり、昇順）
    fn hidden_rows(&self, index: usize) -> Result<Capability<Vec<u32>>, KaidokuError>;

    /// 指定シートの非表示列インデックス（0始まり、昇順）
    fn hidden_cols(&self, index: usize) -> Result<Capability<Vec<u32>>, KaidokuError>;

    /// 指定シートの埋め込みオブジェクト（図形・画像）数
    fn embedded_object_count(&self, index: usize) -> Result<Capability<usize>, KaidokuError>;

    /// 指定シートの書式付きセルのマップ（書式付きセルのみ）
    fn cell_styles(
        &self,
        index: usize,
    ) -> Result<Capability<HashMap<(u32, u32), CellStyle>>, KaidokuError>;
}

/// シートインデックスの範囲検証（アダプター共通）
pub(crate) fn check_sheet_index(
    sheet_names: &[String],
    index: usize,
) -> Result<(), KaidokuError> {
    if index >= sheet_names.len() {
        return Err(KaidokuError::Config(format!(
            "Sheet index {} is out of range (total: {})",
            index,
            sheet_names.len()
        )));
    }
    Ok(())
}
