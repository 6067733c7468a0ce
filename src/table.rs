//! Table Module
//!
//! フォーマットアダプターから形式非依存の正規化テーブルを構築する
//! モジュール。シートごとに1つの`Table`を生成し、セル値に加えて
//! 構造メタデータ（結合セル、非表示行/列、埋め込みオブジェクト、
//! セル書式、境界外セル）を保持します。以降のルールチェッカーは
//! この正規化表現だけを参照し、元のファイル形式を一切知りません。

use std::collections::{BTreeMap, BTreeSet};

use crate::adapter::FormatAdapter;
use crate::error::KaidokuError;
use crate::limits::ResourceLimits;
use crate::types::{
    Capability, CellCoord, CellRange, CellStyle, CellValue, FileFormat, MergedRegion,
};

/// 正規化テーブルの1セル
#[derive(Debug, Clone)]
pub struct Cell {
    /// 型付きの値
    pub value: CellValue,

    /// 表示用の生文字列
    pub raw: String,

    /// シート絶対行インデックス（0始まり）
    pub row: u32,

    /// シート絶対列インデックス（0始まり）
    pub col: u32,

    /// 書式フラグ（書式能力がない形式では常にデフォルト）
    pub style: CellStyle,

    /// 数値らしき文字列だが数値として解釈できない（型不整合）
    pub type_mismatch: bool,

    /// 機種依存文字を含む
    pub machine_dependent: bool,
}

impl Cell {
    /// 空セルを生成
    fn empty(row: u32, col: u32) -> Self {
        Self {
            value: CellValue::Empty,
            raw: String::new(),
            row,
            col,
            style: CellStyle::default(),
            type_mismatch: false,
            machine_dependent: false,
        }
    }

    /// セルの座標
    pub fn coord(&self) -> CellCoord {
        CellCoord::new(self.row, self.col)
    }
}

/// 正規化テーブル（1シートにつき1つ）
///
/// 境界（`boundary`）内のセルを密な行列として保持します。
/// 行・列のインデックスは`rows`内では0始まりの相対位置、
/// `Cell`自体はシート絶対座標を持ちます。
#[derive(Debug)]
pub struct Table {
    /// シート名（CSVは暗黙シート"CSV"）
    pub sheet_name: String,

    /// 元ファイルの形式タグ
    pub file_format: FileFormat,

    /// 検出されたテーブル境界（シート絶対座標）
    pub boundary: CellRange,

    /// 境界内の密なセル行列
    pub rows: Vec<Vec<Cell>>,

    /// 検出されたヘッダー行（`rows`内のインデックス、通常0）
    pub header_row: Option<usize>,

    /// セル結合範囲のリスト
    pub merged_regions: Capability<Vec<MergedRegion>>,

    /// 非表示行インデックス
    pub hidden_rows: Capability<Vec<u32>>,

    /// 非表示列インデックス
    pub hidden_cols: Capability<Vec<u32>>,

    /// 埋め込みオブジェクト数
    pub embedded_objects: Capability<usize>,

    /// セル書式情報が取得できたか
    pub styles_supported: bool,

    /// 複数の互いに素な非空領域が検出された（複数テーブルの候補）
    pub multiple_regions: bool,

    /// 境界外の非空セル（表外の注記・備考）
    pub outside_cells: Vec<(CellCoord, String)>,

    /// 行数上限により切り詰められた
    pub truncated: bool,
}

impl Table {
    /// テーブルが空（非空セルを持たない）かどうか
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 境界内の列数
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    /// ヘッダー行の表示文字列リスト（検出されている場合）
    pub fn headers(&self) -> Option<Vec<String>> {
        let header_row = self.header_row?;
        Some(
            self.rows[header_row]
                .iter()
                .map(|cell| cell.raw.clone())
                .collect(),
        )
    }

    /// ヘッダー行を除いたデータ行
    pub fn data_rows(&self) -> &[Vec<Cell>] {
        match self.header_row {
            Some(header_row) => &self.rows[header_row + 1..],
            None => &self.rows,
        }
    }

    /// 指定列のデータセル（ヘッダー行を除く）
    pub fn column_cells(&self, col: usize) -> Vec<&Cell> {
        self.data_rows()
            .iter()
            .filter_map(|row| row.get(col))
            .collect()
    }

    /// 指定列の表示名（ヘッダーがなければ列のA1記法）
    pub fn column_name(&self, col: usize) -> String {
        self.headers()
            .and_then(|headers| headers.get(col).cloned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                CellCoord::new(0, self.boundary.start.col + col as u32)
                    .to_a1_notation()
                    .trim_end_matches(|c: char| c.is_ascii_digit())
                    .to_string()
            })
    }
}

/// 機種依存文字（エンコーディング間で往復しない文字）の判定
///
/// 丸囲み数字、ローマ数字グリフ、CJK互換文字、組文字などの
/// 固定の拒否リストに基づきます。
pub(crate) fn contains_machine_dependent(text: &str) -> bool {
    text.chars().any(|ch| {
        matches!(ch,
            '\u{2460}'..='\u{2473}'     // ①-⑳
            | '\u{24EA}'..='\u{24FF}'   // ⓪⓫-⓿
            | '\u{2160}'..='\u{216B}'   // Ⅰ-Ⅻ
            | '\u{3300}'..='\u{33FF}'   // ㍉㌔㌢などのCJK互換文字
            | '㊤' | '㊥' | '㊦' | '㊧' | '㊨'
            | '㈱' | '㈲' | '㈹' | '℡' | '〒' | '〓' | '※')
    })
}

/// 数値を意図したとみられる文字列かどうか（桁区切りなどの装飾を許容）
pub(crate) fn is_numeric_like(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-' | '+'))
}

/// アダプターから正規化テーブル群を構築
///
/// # 引数
///
/// * `adapter` - 入力ファイルのフォーマットアダプター
/// * `limits` - 行数上限を含む資源上限
///
/// # 戻り値
///
/// シートごとに1つの`Table`（シート定義順）。セル値の不整合では
/// 失敗せず、構造メタデータとして記録します。
pub fn parse_tables(
    adapter: &mut dyn FormatAdapter,
    limits: &ResourceLimits,
) -> Result<Vec<Table>, KaidokuError> {
    let sheet_count = adapter.sheet_names().len();
    let file_format = adapter.file_format();
    let mut tables = Vec::with_capacity(sheet_count);

    for index in 0..sheet_count {
        let sheet_name = adapter.sheet_names()[index].clone();
        let cells = adapter.sheet_cells(index)?;
        let merged_regions = adapter.merged_regions(index)?;
        let hidden_rows = adapter.hidden_rows(index)?;
        let hidden_cols = adapter.hidden_cols(index)?;
        let embedded_objects = adapter.embedded_object_count(index)?;
        let styles = adapter.cell_styles(index)?;

        let table = build_table(
            sheet_name,
            file_format,
            cells,
            merged_regions,
            hidden_rows,
            hidden_cols,
            embedded_objects,
            styles,
            limits,
        );
        tracing::debug!(
            sheet = %table.sheet_name,
            rows = table.rows.len(),
            header = table.header_row.is_some(),
            multiple_regions = table.multiple_regions,
            "table parsed"
        );
        tables.push(table);
    }

    Ok(tables)
}

/// 1シート分の正規化テーブルを構築
#[allow(clippy::too_many_arguments)]
fn build_table(
    sheet_name: String,
    file_format: FileFormat,
    cells: Vec<(CellCoord, CellValue)>,
    merged_regions: Capability<Vec<MergedRegion>>,
    hidden_rows: Capability<Vec<u32>>,
    hidden_cols: Capability<Vec<u32>>,
    embedded_objects: Capability<usize>,
    styles: Capability<std::collections::HashMap<(u32, u32), CellStyle>>,
    limits: &ResourceLimits,
) -> Table {
    // 非空セルを行ごとに整理
    let mut by_coord: BTreeMap<(u32, u32), CellValue> = BTreeMap::new();
    let mut nonempty_rows: BTreeSet<u32> = BTreeSet::new();
    for (coord, value) in cells {
        nonempty_rows.insert(coord.row);
        by_coord.insert((coord.row, coord.col), value);
    }

    let styles_supported = styles.is_supported();
    let style_map = match &styles {
        Capability::Supported(map) => map.clone(),
        Capability::Unsupported => Default::default(),
    };

    // 空シート
    if by_coord.is_empty() {
        return Table {
            sheet_name,
            file_format,
            boundary: CellRange::new(CellCoord::new(0, 0), CellCoord::new(0, 0)),
            rows: Vec::new(),
            header_row: None,
            merged_regions,
            hidden_rows,
            hidden_cols,
            embedded_objects,
            styles_supported,
            multiple_regions: false,
            outside_cells: Vec::new(),
            truncated: false,
        };
    }

    // 完全空行で区切られた行ブロックに分割する。先頭・末尾の空行は
    // この時点で自然に取り除かれる（非空行だけを見るため）。
    let mut blocks: Vec<(u32, u32)> = Vec::new();
    let mut block_start: Option<u32> = None;
    let mut prev_row: Option<u32> = None;
    for &row in &nonempty_rows {
        match (block_start, prev_row) {
            (Some(start), Some(prev)) if row > prev + 1 => {
                blocks.push((start, prev));
                block_start = Some(row);
            }
            (None, _) => block_start = Some(row),
            _ => {}
        }
        prev_row = Some(row);
    }
    if let (Some(start), Some(prev)) = (block_start, prev_row) {
        blocks.push((start, prev));
    }

    // セル数が最大のブロックをテーブル本体とみなす
    let cell_count = |&(start, end): &(u32, u32)| {
        by_coord
            .range((start, 0)..=(end, u32::MAX))
            .count()
    };
    let main_index = blocks
        .iter()
        .enumerate()
        .max_by_key(|(_, block)| cell_count(block))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let multiple_regions = blocks.len() > 1;

    let (mut row_start, mut row_end) = blocks[main_index];

    // 行数上限による切り詰め
    let mut truncated = false;
    let row_span = (row_end - row_start + 1) as usize;
    if row_span > limits.max_table_rows {
        row_end = row_start + limits.max_table_rows as u32 - 1;
        truncated = true;
        tracing::warn!(
            sheet = %sheet_name,
            dropped = row_span - limits.max_table_rows,
            "rows beyond cap excluded from table"
        );
    }

    // テーブル本体の列境界（空の先頭・末尾列をトリム）
    let mut col_start = u32::MAX;
    let mut col_end = 0u32;
    for (&(row, col), _) in by_coord.range((row_start, 0)..=(row_end, u32::MAX)) {
        let _ = row;
        col_start = col_start.min(col);
        col_end = col_end.max(col);
    }
    if col_start == u32::MAX {
        // 切り詰めによりセルが残らなかった場合の防御
        col_start = 0;
        col_end = 0;
    }
    let boundary = CellRange::new(
        CellCoord::new(row_start, col_start),
        CellCoord::new(row_end, col_end),
    );

    // テーブル本体以外のブロックと、切り詰めで除外されなかった範囲外
    // セルを境界外セルとして記録する
    let mut outside_cells = Vec::new();
    for (&(row, col), value) in &by_coord {
        let coord = CellCoord::new(row, col);
        let in_main_block = {
            let (start, end) = blocks[main_index];
            row >= start && row <= end
        };
        if in_main_block && row <= row_end {
            continue;
        }
        if truncated && in_main_block {
            // 上限超過行は境界外扱いにせず、切り詰めとして報告する
            continue;
        }
        outside_cells.push((coord, value.as_display_string()));
    }

    // 境界内の密な行列を構築
    let mut rows = Vec::with_capacity((row_end - row_start + 1) as usize);
    for row in row_start..=row_end {
        let mut dense_row = Vec::with_capacity((col_end - col_start + 1) as usize);
        for col in col_start..=col_end {
            let cell = match by_coord.get(&(row, col)) {
                Some(value) => {
                    let raw = value.as_display_string();
                    let type_mismatch = matches!(value, CellValue::Text(text)
                        if is_numeric_like(text) && text.trim().parse::<f64>().is_err());
                    let machine_dependent = matches!(value, CellValue::Text(text)
                        if contains_machine_dependent(text));
                    Cell {
                        value: value.clone(),
                        raw,
                        row,
                        col,
                        style: style_map.get(&(row, col)).copied().unwrap_or_default(),
                        type_mismatch,
                        machine_dependent,
                    }
                }
                None => Cell::empty(row, col),
            };
            dense_row.push(cell);
        }
        rows.push(dense_row);
    }

    // ヘッダー検出: 先頭行のすべてのセルが非空テキストで、
    // 後続のデータ行が存在する場合にヘッダーとみなす
    let header_row = detect_header(&rows);

    Table {
        sheet_name,
        file_format,
        boundary,
        rows,
        header_row,
        merged_regions,
        hidden_rows,
        hidden_cols,
        embedded_objects,
        styles_supported,
        multiple_regions,
        outside_cells,
        truncated,
    }
}

/// ヘッダー行の検出
///
/// 先頭行のすべてのセルが非空のテキストであり、かつ後続行が
/// 存在する場合に、先頭行をヘッダーとします。本文がすべて
/// テキストの表でもヘッダーの資格は失われません。
fn detect_header(rows: &[Vec<Cell>]) -> Option<usize> {
    if rows.len() < 2 {
        return None;
    }
    let first = &rows[0];
    let all_text = first
        .iter()
        .all(|cell| matches!(cell.value, CellValue::Text(_)));
    if all_text {
        Some(0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::CsvAdapter;

    fn parse_csv(content: &str) -> Vec<Table> {
        let mut adapter = CsvAdapter::new(content, "test.csv").unwrap();
        parse_tables(&mut adapter, &ResourceLimits::default()).unwrap()
    }

    // 境界検出のテスト
    #[test]
    fn test_simple_rectangular_table() {
        let tables = parse_csv("name,age\nAlice,30\nBob,25\n");
        assert_eq!(tables.len(), 1);

        let table = &tables[0];
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.header_row, Some(0));
        assert!(!table.multiple_regions);
        assert!(table.outside_cells.is_empty());
        assert_eq!(table.boundary.to_a1_notation(), "A1:B3");
    }

    #[test]
    fn test_leading_empty_rows_trimmed() {
        let tables = parse_csv(",,\n,,\nname,age,city\nAlice,30,Tokyo\n");
        let table = &tables[0];
        assert_eq!(table.boundary.start.row, 2);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.header_row, Some(0));
    }

    #[test]
    fn test_headers_accessor() {
        let tables = parse_csv("name,age\nAlice,30\n");
        let headers = tables[0].headers().unwrap();
        assert_eq!(headers, vec!["name".to_string(), "age".to_string()]);
        assert_eq!(tables[0].data_rows().len(), 1);
    }

    #[test]
    fn test_numeric_first_row_is_not_header() {
        let tables = parse_csv("1,2\n3,4\n");
        assert_eq!(tables[0].header_row, None);
        // ヘッダーがない場合、すべての行がデータ行
        assert_eq!(tables[0].data_rows().len(), 2);
    }

    #[test]
    fn test_single_row_has_no_header() {
        let tables = parse_csv("name,age\n");
        assert_eq!(tables[0].header_row, None);
    }

    // 複数領域検出のテスト
    #[test]
    fn test_disjoint_regions_flagged() {
        let tables = parse_csv("a,b\n1,2\n3,4\n,\nx,y\n5,6\n");
        let table = &tables[0];
        assert!(table.multiple_regions);
        // セル数の多い最初のブロックが本体
        assert_eq!(table.boundary.start.row, 0);
        assert_eq!(table.rows.len(), 3);
        // 2つ目の領域は境界外セルとして記録
        assert!(!table.outside_cells.is_empty());
        assert!(table
            .outside_cells
            .iter()
            .any(|(coord, text)| coord.row == 4 && text == "x"));
    }

    #[test]
    fn test_largest_block_wins() {
        // 表の上にタイトル行がある場合、本体は大きい方のブロック
        let tables = parse_csv("title,\n,\nname,age\nAlice,30\nBob,25\n");
        let table = &tables[0];
        assert!(table.multiple_regions);
        assert_eq!(table.boundary.start.row, 2);
        assert_eq!(table.header_row, Some(0));
        assert!(table
            .outside_cells
            .iter()
            .any(|(coord, text)| coord.row == 0 && text == "title"));
    }

    // フラグ付与のテスト
    #[test]
    fn test_type_mismatch_flag() {
        let tables = parse_csv("amount\n\"1,234\"\n56\n");
        let table = &tables[0];
        let cells = table.column_cells(0);
        assert!(cells[0].type_mismatch, "comma-decorated number is flagged");
        assert!(!cells[1].type_mismatch);
    }

    #[test]
    fn test_machine_dependent_flag() {
        let tables = parse_csv("rank\n①\nA\n");
        let table = &tables[0];
        let cells = table.column_cells(0);
        assert!(cells[0].machine_dependent);
        assert!(!cells[1].machine_dependent);
    }

    // 行数上限のテスト
    #[test]
    fn test_row_cap_truncates() {
        let mut content = String::from("value\n");
        for i in 0..100 {
            content.push_str(&format!("{}\n", i));
        }
        let mut adapter = CsvAdapter::new(&content, "big.csv").unwrap();
        let limits = ResourceLimits {
            max_table_rows: 10,
            ..ResourceLimits::default()
        };
        let tables = parse_tables(&mut adapter, &limits).unwrap();
        let table = &tables[0];
        assert!(table.truncated);
        assert_eq!(table.rows.len(), 10);
        // 上限超過行は境界外セルには数えない
        assert!(table.outside_cells.is_empty());
    }

    // ヘルパー関数のテスト
    #[test]
    fn test_is_numeric_like() {
        assert!(is_numeric_like("123"));
        assert!(is_numeric_like("1,234"));
        assert!(is_numeric_like("-5.5"));
        assert!(is_numeric_like(" 42 "));
        assert!(!is_numeric_like("abc"));
        assert!(!is_numeric_like("12a"));
        assert!(!is_numeric_like(""));
        assert!(!is_numeric_like("-"));
    }

    #[test]
    fn test_contains_machine_dependent() {
        assert!(contains_machine_dependent("①番"));
        assert!(contains_machine_dependent("㈱サンプル"));
        assert!(contains_machine_dependent("Ⅲ期"));
        assert!(contains_machine_dependent("〒100-0001"));
        assert!(!contains_machine_dependent("普通のテキスト"));
        assert!(!contains_machine_dependent("plain text 123"));
    }

    #[test]
    fn test_empty_sheet_yields_empty_table() {
        let tables = parse_csv("");
        assert_eq!(tables.len(), 1);
        assert!(tables[0].is_empty());
        assert_eq!(tables[0].header_row, None);
    }

    #[test]
    fn test_column_name_fallback() {
        let tables = parse_csv("10,20\n30,40\n");
        // ヘッダーがないため列のアルファベット名にフォールバック
        assert_eq!(tables[0].column_name(0), "A");
        assert_eq!(tables[0].column_name(1), "B");
    }
}
