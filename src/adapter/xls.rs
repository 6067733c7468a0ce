//! XLS Adapter Module
//!
//! 旧バイナリ形式（OLE2コンテナ）のスプレッドシートを公開するアダプター。
//! calamineの`Xls`パーサーをラップします。セル値・シート一覧・結合セルは
//! 取得できますが、非表示行/列・セル書式・埋め込みオブジェクトは
//! バイナリ形式からの抽出を提供しないため`Unsupported`を返します。

use calamine::{Data, Reader as CalamineReader, Xls};
use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::adapter::{check_sheet_index, FormatAdapter};
use crate::error::KaidokuError;
use crate::types::{
    Capability, CellCoord, CellRange, CellStyle, CellValue, FileFormat, MergedRegion,
};

/// XLSアダプター
///
/// calamineのワークブックをラップし、共通能力インターフェースに
/// 適合させます。書式・図形の検出は旧形式では縮退しており、
/// 対応するルールは「検証不可の警告」として報告されます。
pub struct XlsAdapter<RS: Read + Seek> {
    /// calamineのワークブック
    workbook: Xls<RS>,
    /// シート名のリスト（ワークブック定義順）
    sheet_names: Vec<String>,
}

impl<RS: Read + Seek> XlsAdapter<RS> {
    /// calamineのワークブックからアダプターを構築
    pub(crate) fn from_workbook(workbook: Xls<RS>) -> Self {
        let sheet_names = workbook.sheet_names().to_vec();
        Self {
            workbook,
            sheet_names,
        }
    }
}

/// calamineのセル値を正規化された型付き値に変換
pub(crate) fn convert_data(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("{:?}", e)),
        Data::Empty => CellValue::Empty,
    }
}

impl<RS: Read + Seek> FormatAdapter for XlsAdapter<RS> {
    fn file_format(&self) -> FileFormat {
        FileFormat::Xls
    }

    fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    fn sheet_cells(
        &mut self,
        index: usize,
    ) -> Result<Vec<(CellCoord, CellValue)>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        let sheet_name = self.sheet_names[index].clone();

        let range = self
            .workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| KaidokuError::Parse(e.into()))?;

        // calamineのRangeは最初の非空セルを原点とするため、
        // シート絶対座標に補正する
        let start = range.start().unwrap_or((0, 0));
        let mut cells = Vec::new();
        for (row, col, data) in range.used_cells() {
            let value = convert_data(data);
            if !value.is_empty() {
                cells.push((
                    CellCoord::new(start.0 + row as u32, start.1 + col as u32),
                    value,
                ));
            }
        }
        Ok(cells)
    }

    fn merged_regions(
        &mut self,
        index: usize,
    ) -> Result<Capability<Vec<MergedRegion>>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        let sheet_name = self.sheet_names[index].clone();

        let regions = match self.workbook.worksheet_merge_cells(&sheet_name) {
            Some(dims) => dims
                .iter()
                .map(|d| {
                    let range = CellRange::new(
                        CellCoord::new(d.start.0, d.start.1),
                        CellCoord::new(d.end.0, d.end.1),
                    );
                    MergedRegion::new(range)
                })
                .collect(),
            None => Vec::new(),
        };
        Ok(Capability::Supported(regions))
    }

    fn hidden_rows(&self, index: usize) -> Result<Capability<Vec<u32>>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        Ok(Capability::Unsupported)
    }

    fn hidden_cols(&self, index: usize) -> Result<Capability<Vec<u32>>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        Ok(Capability::Unsupported)
    }

    fn embedded_object_count(&self, index: usize) -> Result<Capability<usize>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        Ok(Capability::Unsupported)
    }

    fn cell_styles(
        &self,
        index: usize,
    ) -> Result<Capability<HashMap<(u32, u32), CellStyle>>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        Ok(Capability::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // convert_data のテスト（ワークブックを必要としない変換ロジックのみ。
    // 実ファイルを使う検証は統合テストで行う）
    #[test]
    fn test_convert_data_numbers() {
        assert_eq!(convert_data(&Data::Int(42)), CellValue::Number(42.0));
        assert_eq!(convert_data(&Data::Float(2.5)), CellValue::Number(2.5));
    }

    #[test]
    fn test_convert_data_text_and_empty() {
        assert_eq!(
            convert_data(&Data::String("abc".to_string())),
            CellValue::Text("abc".to_string())
        );
        assert_eq!(convert_data(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn test_convert_data_bool_becomes_text() {
        assert_eq!(
            convert_data(&Data::Bool(true)),
            CellValue::Text("true".to_string())
        );
    }
}
