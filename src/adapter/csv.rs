//! CSV Adapter Module
//!
//! 復号済みのカンマ区切りテキストを単一の暗黙シートとして公開する
//! アダプター。CSVは結合セル・非表示行列・書式・埋め込みオブジェクトを
//! 表現できないため、これらの構造クエリにはすべて`Unsupported`を返します。

use std::collections::HashMap;

use crate::adapter::{check_sheet_index, FormatAdapter};
use crate::error::KaidokuError;
use crate::types::{Capability, CellCoord, CellStyle, CellValue, FileFormat, MergedRegion};

/// CSVの暗黙シート名
const CSV_SHEET_NAME: &str = "CSV";

/// CSVアダプター
///
/// ローダーがエンコーディング自動判定で復号したテキストから構築します。
/// フィールド数が行ごとに異なるCSVも受理します（不足分は空セル扱い）。
pub struct CsvAdapter {
    /// 単一の暗黙シート名
    sheet_names: Vec<String>,
    /// 生のレコード（行 × フィールド）
    records: Vec<Vec<String>>,
}

impl CsvAdapter {
    /// 復号済みテキストからアダプターを構築
    ///
    /// # 引数
    ///
    /// * `decoded` - エンコーディング判定済みのCSVテキスト
    /// * `display_name` - エラー文脈に使用するファイル表示名
    ///
    /// # 戻り値
    ///
    /// * `Ok(CsvAdapter)` - レコードの読み取りに成功した場合
    /// * `Err(KaidokuError::StructuralParse)` - CSVとして解釈できない場合
    pub fn new(decoded: &str, display_name: &str) -> Result<Self, KaidokuError> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(decoded.as_bytes());

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| KaidokuError::StructuralParse {
                path: display_name.to_string(),
                stage: "csv-record".to_string(),
                message: e.to_string(),
            })?;
            records.push(record.iter().map(|field| field.to_string()).collect());
        }

        tracing::debug!(rows = records.len(), "csv adapter constructed");

        Ok(Self {
            sheet_names: vec![CSV_SHEET_NAME.to_string()],
            records,
        })
    }

    /// フィールド文字列を型付きのセル値に変換
    ///
    /// 文字列全体がf64として解釈できる場合のみ数値とします。
    /// 前後の空白を含むフィールドはテキストのまま保持され、
    /// 空白整形の検査対象になります。
    fn field_to_value(field: &str) -> CellValue {
        if field.is_empty() {
            return CellValue::Empty;
        }
        match field.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(field.to_string()),
        }
    }
}

impl FormatAdapter for CsvAdapter {
    fn file_format(&self) -> FileFormat {
        FileFormat::Csv
    }

    fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    fn sheet_cells(
        &mut self,
        index: usize,
    ) -> Result<Vec<(CellCoord, CellValue)>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;

        let mut cells = Vec::new();
        for (row_idx, record) in self.records.iter().enumerate() {
            for (col_idx, field) in record.iter().enumerate() {
                let value = Self::field_to_value(field);
                if !value.is_empty() {
                    cells.push((CellCoord::new(row_idx as u32, col_idx as u32), value));
                }
            }
        }
        Ok(cells)
    }

    fn merged_regions(
        &mut self,
        index: usize,
    ) -> Result<Capability<Vec<MergedRegion>>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        Ok(Capability::Unsupported)
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
