//! XLSX Adapter Module
//!
//! ZIPベースの現行形式（OOXML）のスプレッドシートを公開するアダプター。
//! セル値と結合セルはcalamineから、非表示行/列・セル書式・図形は
//! `XlsxStructureScan`によるXML直接解析から取得します。
//! 3形式の中で唯一、全能力をサポートします。

use calamine::{Reader as CalamineReader, Xlsx};
use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::adapter::structure::XlsxStructureScan;
use crate::adapter::xls::convert_data;
use crate::adapter::{check_sheet_index, FormatAdapter};
use crate::error::KaidokuError;
use crate::limits::ResourceLimits;
use crate::types::{
    Capability, CellCoord, CellRange, CellStyle, CellValue, FileFormat, MergedRegion,
};

/// XLSXアダプター
///
/// calamineのワークブックと構造スキャナーの両方を保持します。
/// 同一バッファを2回読むコストはかかりますが、calamineが公開しない
/// 構造情報（非表示行/列、書式、図形）を取得するために必要です。
pub struct XlsxAdapter<RS: Read + Seek> {
    /// calamineのワークブック
    workbook: Xlsx<RS>,
    /// XML直接解析による構造情報
    scan: XlsxStructureScan,
    /// シート名のリスト（ワークブック定義順）
    sheet_names: Vec<String>,
}

impl<RS: Read + Seek> XlsxAdapter<RS> {
    /// calamineのワークブックと構造スキャナーからアダプターを構築
    pub(crate) fn from_parts(workbook: Xlsx<RS>, scan: XlsxStructureScan) -> Self {
        let sheet_names = workbook.sheet_names().to_vec();
        Self {
            workbook,
            scan,
            sheet_names,
        }
    }
}

impl XlsxAdapter<std::io::Cursor<Vec<u8>>> {
    /// ファイル内容のバイト列からアダプターを構築
    ///
    /// # 引数
    ///
    /// * `bytes` - XLSXファイルの全内容
    /// * `limits` - アーカイブ検証に適用する資源上限
    pub(crate) fn from_bytes(
        bytes: Vec<u8>,
        limits: &ResourceLimits,
    ) -> Result<Self, KaidokuError> {
        // 構造スキャンとcalamineはそれぞれ独立にシークするため、バッファを複製する
        let scan = XlsxStructureScan::new(std::io::Cursor::new(bytes.clone()), limits)?;
        let workbook = Xlsx::new(std::io::Cursor::new(bytes))
            .map_err(|e| KaidokuError::Parse(e.into()))?;
        Ok(Self::from_parts(workbook, scan))
    }
}

impl<RS: Read + Seek> FormatAdapter for XlsxAdapter<RS> {
    fn file_format(&self) -> FileFormat {
        FileFormat::Xlsx
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

        self.workbook
            .load_merged_regions()
            .map_err(|e| KaidokuError::Parse(e.into()))?;
        let regions = match self.workbook.worksheet_merge_cells(&sheet_name) {
            Some(Ok(regions)) => regions
                .iter()
                .map(|dims| {
                    let range = CellRange::new(
                        CellCoord::new(dims.start.0, dims.start.1),
                        CellCoord::new(dims.end.0, dims.end.1),
                    );
                    MergedRegion::new(range)
                })
                .collect(),
            Some(Err(_)) | None => Vec::new(),
        };
        Ok(Capability::Supported(regions))
    }

    fn hidden_rows(&self, index: usize) -> Result<Capability<Vec<u32>>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        Ok(Capability::Supported(self.scan.hidden_rows(index)))
    }

    fn hidden_cols(&self, index: usize) -> Result<Capability<Vec<u32>>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        Ok(Capability::Supported(self.scan.hidden_cols(index)))
    }

    fn embedded_object_count(&self, index: usize) -> Result<Capability<usize>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        Ok(Capability::Supported(self.scan.drawing_count(index)))
    }

    fn cell_styles(
        &self,
        index: usize,
    ) -> Result<Capability<HashMap<(u32, u32), CellStyle>>, KaidokuError> {
        check_sheet_index(&self.sheet_names, index)?;
        Ok(Capability::Supported(self.scan.cell_styles(index)))
    }
}

// 実XLSXファイルを必要とするテストは統合テスト（tests/）で実装します。
