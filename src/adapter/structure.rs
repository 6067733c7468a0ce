//! XLSX Structure Scan Module
//!
//! XLSX内部のXMLファイルから、calamineで取得不可能な構造情報を抽出する
//! モジュール。非表示行/列、セル書式フラグ、図形（埋め込みオブジェクト）
//! の有無を提供します。

use std::collections::{BTreeSet, HashMap};
use std::io::{Read, Seek};
use zip::ZipArchive;

use crate::error::KaidokuError;
use crate::limits::{validate_zip_path, ResourceLimits};
use crate::types::CellStyle;

/// スタイルテーブル（xl/styles.xml）の抽出結果
#[derive(Debug, Default)]
struct StyleTables {
    /// fontId -> 太字フラグ
    bold_fonts: Vec<bool>,
    /// fillId -> 塗りつぶしフラグ
    pattern_fills: Vec<bool>,
    /// styleId (cellXfs) -> (fontId, fillId)
    cell_xfs: Vec<(u32, u32)>,
}

impl StyleTables {
    /// スタイルIDをセル書式フラグに解決
    fn resolve(&self, style_id: u32) -> CellStyle {
        let Some(&(font_id, fill_id)) = self.cell_xfs.get(style_id as usize) else {
            return CellStyle::default();
        };
        CellStyle {
            bold: self.bold_fonts.get(font_id as usize).copied().unwrap_or(false),
            filled: self
                .pattern_fills
                .get(fill_id as usize)
                .copied()
                .unwrap_or(false),
        }
    }
}

/// XLSX構造スキャナー
///
/// XLSXファイル（ZIPアーカイブ）からXMLを直接解析し、
/// calamineで取得できない構造情報を抽出します。
/// シートはワークブック定義（xl/workbook.xml）の並び順で
/// 0始まりのインデックスにより参照されます。
#[derive(Debug, Clone)]
pub(crate) struct XlsxStructureScan {
    /// ワークブック定義順のシート名リスト
    sheet_names: Vec<String>,
    /// シートインデックス -> 非表示行インデックスのセット
    hidden_rows: HashMap<usize, BTreeSet<u32>>,
    /// シートインデックス -> 非表示列インデックスのセット
    hidden_cols: HashMap<usize, BTreeSet<u32>>,
    /// シートインデックス -> セル座標 -> 書式フラグ（書式付きセルのみ保持）
    cell_styles: HashMap<usize, HashMap<(u32, u32), CellStyle>>,
    /// シートインデックス -> 図形・画像パーツ数
    drawing_counts: HashMap<usize, usize>,
}

impl XlsxStructureScan {
    /// XLSXファイル（ZIPアーカイブ）から構造情報を解析
    ///
    /// # 引数
    ///
    /// * `reader` - XLSXファイルを読み込むためのリーダー（Read + Seekトレイトを実装）
    /// * `limits` - アーカイブ検証に適用する資源上限
    ///
    /// # 戻り値
    ///
    /// * `Ok(XlsxStructureScan)` - 構造情報の解析に成功した場合
    /// * `Err(KaidokuError)` - 解析エラーまたは資源上限違反が発生した場合
    pub fn new<R: Read + Seek>(
        reader: R,
        limits: &ResourceLimits,
    ) -> Result<Self, KaidokuError> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| KaidokuError::Zip(format!("{}", e)))?;

        Self::verify_archive(&mut archive, limits)?;

        // 1. xl/styles.xml を解析
        let styles = Self::parse_styles(&mut archive)?;

        // 2. xl/workbook.xml とリレーションシップから、シート名と
        //    ワークシートXMLパスの対応を構築
        let sheets = Self::parse_workbook_sheets(&mut archive)?;

        // 3. 各ワークシートXMLを解析
        let mut hidden_rows = HashMap::new();
        let mut hidden_cols = HashMap::new();
        let mut cell_styles = HashMap::new();
        let mut drawing_counts = HashMap::new();
        let mut sheet_names = Vec::with_capacity(sheets.len());

        for (index, (name, part_path)) in sheets.iter().enumerate() {
            sheet_names.push(name.clone());

            if let Ok(mut part) = archive.by_name(part_path) {
                let mut xml_content = Vec::new();
                part.read_to_end(&mut xml_content)?;
                drop(part);

                let scan = Self::parse_worksheet_xml(&xml_content, &styles)?;
                if !scan.hidden_rows.is_empty() {
                    hidden_rows.insert(index, scan.hidden_rows);
                }
                if !scan.hidden_cols.is_empty() {
                    hidden_cols.insert(index, scan.hidden_cols);
                }
                if !scan.styled_cells.is_empty() {
                    cell_styles.insert(index, scan.styled_cells);
                }
            }

            let drawings = Self::count_sheet_drawings(&mut archive, part_path)?;
            drawing_counts.insert(index, drawings);
        }

        Ok(Self {
            sheet_names,
            hidden_rows,
            hidden_cols,
            cell_styles,
            drawing_counts,
        })
    }

    /// ワークブック定義順のシート名を取得
    #[allow(dead_code)]
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// 指定シートの非表示行インデックス（0始まり、昇順）を取得
    pub fn hidden_rows(&self, index: usize) -> Vec<u32> {
        self.hidden_rows
            .get(&index)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 指定シートの非表示列インデックス（0始まり、昇順）を取得
    pub fn hidden_cols(&self, index: usize) -> Vec<u32> {
        self.hidden_cols
            .get(&index)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 指定シートの書式付きセルのマップを取得
    pub fn cell_styles(&self, index: usize) -> HashMap<(u32, u32), CellStyle> {
        self.cell_styles.get(&index).cloned().unwrap_or_default()
    }

    /// 指定シートから参照される図形・画像パーツ数を取得
    pub fn drawing_count(&self, index: usize) -> usize {
        self.drawing_counts.get(&index).copied().unwrap_or(0)
    }

    /// アーカイブ全体の安全性検証（ファイル数・サイズ上限・パス検証）
    fn verify_archive<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        limits: &ResourceLimits,
    ) -> Result<(), KaidokuError> {
        if archive.len() > limits.max_archive_file_count {
            return Err(KaidokuError::ResourceLimit(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                limits.max_archive_file_count
            )));
        }

        let mut total_decompressed_size = 0u64;
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| KaidokuError::Zip(format!("{}", e)))?;

            // パストラバーサル対策
            let file_name = file.name();
            validate_zip_path(file_name)
                .map_err(|e| KaidokuError::ResourceLimit(format!("Invalid ZIP path: {}", e)))?;

            let file_size = file.size();
            if file_size > limits.max_archive_entry_size {
                return Err(KaidokuError::ResourceLimit(format!(
                    "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    file_name, file_size, limits.max_archive_entry_size
                )));
            }

            total_decompressed_size = total_decompressed_size
                .checked_add(file_size)
                .ok_or_else(|| {
                    KaidokuError::ResourceLimit(
                        "Total decompressed size calculation overflow".to_string(),
                    )
                })?;

            if total_decompressed_size > limits.max_decompressed_size {
                return Err(KaidokuError::ResourceLimit(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_decompressed_size, limits.max_decompressed_size
                )));
            }
        }

        Ok(())
    }

    /// xl/styles.xml の解析（プライベート）
    ///
    /// `<fonts>`、`<fills>`、`<cellXfs>`を解析し、スタイルIDから
    /// 書式フラグへの解決テーブルを構築します。
    fn parse_styles<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<StyleTables, KaidokuError> {
        let mut tables = StyleTables::default();

        let mut styles_file = match archive.by_name("xl/styles.xml") {
            Ok(file) => file,
            Err(_) => {
                // styles.xmlが存在しない場合は空のテーブルを返す
                return Ok(tables);
            }
        };

        let mut xml_content = Vec::new();
        styles_file.read_to_end(&mut xml_content)?;

        use quick_xml::events::Event;
        use quick_xml::Reader;

        let mut reader = Reader::from_reader(xml_content.as_slice());
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut in_fonts = false;
        let mut in_fills = false;
        let mut in_cell_xfs = false;
        let mut in_font = false;
        let mut in_fill = false;
        let mut current_font_bold = false;
        let mut current_fill_patterned = false;

        // 属性の読み取り補助
        fn read_pattern_type(
            e: &quick_xml::events::BytesStart<'_>,
        ) -> Result<Option<bool>, KaidokuError> {
            for attr in e.attributes() {
                let attr = attr
                    .map_err(|e| KaidokuError::Config(format!("XML attribute error: {}", e)))?;
                if attr.key.as_ref() == b"patternType" {
                    let value = std::str::from_utf8(&attr.value)?;
                    // gray125はExcelが常に出力する予約フィル
                    return Ok(Some(value != "none" && value != "gray125"));
                }
            }
            Ok(None)
        }

        fn read_xf_ids(
            e: &quick_xml::events::BytesStart<'_>,
        ) -> Result<(u32, u32), KaidokuError> {
            let mut font_id = 0u32;
            let mut fill_id = 0u32;
            for attr in e.attributes() {
                let attr = attr
                    .map_err(|e| KaidokuError::Config(format!("XML attribute error: {}", e)))?;
                match attr.key.as_ref() {
                    b"fontId" => font_id = std::str::from_utf8(&attr.value)?.parse()?,
                    b"fillId" => fill_id = std::str::from_utf8(&attr.value)?.parse()?,
                    _ => {}
                }
            }
            Ok((font_id, fill_id))
        }

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"fonts" => in_fonts = true,
                    b"fills" => in_fills = true,
                    b"cellXfs" => in_cell_xfs = true,
                    b"font" if in_fonts => {
                        in_font = true;
                        current_font_bold = false;
                    }
                    b"b" if in_font => current_font_bold = true,
                    b"fill" if in_fills => {
                        in_fill = true;
                        current_fill_patterned = false;
                    }
                    b"patternFill" if in_fill => {
                        if let Some(patterned) = read_pattern_type(&e)? {
                            current_fill_patterned = patterned;
                        }
                    }
                    b"xf" if in_cell_xfs => {
                        tables.cell_xfs.push(read_xf_ids(&e)?);
                    }
                    _ => {}
                },
                // 自己終了タグは対応するEndイベントが来ない
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"font" if in_fonts => tables.bold_fonts.push(false),
                    b"fill" if in_fills => tables.pattern_fills.push(false),
                    b"b" if in_font => current_font_bold = true,
                    b"patternFill" if in_fill => {
                        if let Some(patterned) = read_pattern_type(&e)? {
                            current_fill_patterned = patterned;
                        }
                    }
                    b"xf" if in_cell_xfs => {
                        tables.cell_xfs.push(read_xf_ids(&e)?);
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"fonts" => in_fonts = false,
                    b"fills" => in_fills = false,
                    b"cellXfs" => in_cell_xfs = false,
                    b"font" if in_font => {
                        tables.bold_fonts.push(current_font_bold);
                        in_font = false;
                    }
                    b"fill" if in_fill => {
                        tables.pattern_fills.push(current_fill_patterned);
                        in_fill = false;
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(KaidokuError::Config(format!("XML parse error: {}", e))),
                _ => {}
            }
        }

        Ok(tables)
    }

    /// xl/workbook.xml と xl/_rels/workbook.xml.rels の解析（プライベート）
    ///
    /// ワークブック定義順の(シート名, ワークシートXMLパス)のリストを返します。
    fn parse_workbook_sheets<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<Vec<(String, String)>, KaidokuError> {
        // 1. リレーションシップ: r:id -> ターゲットパス
        let relationships = match archive.by_name("xl/_rels/workbook.xml.rels") {
            Ok(mut file) => {
                let mut xml_content = Vec::new();
                file.read_to_end(&mut xml_content)?;
                Self::parse_relationships(&xml_content)?
            }
            Err(_) => HashMap::new(),
        };

        // 2. workbook.xml の <sheet name=".." r:id="rIdN"/> を定義順に収集
        let mut workbook_file = match archive.by_name("xl/workbook.xml") {
            Ok(file) => file,
            Err(_) => {
                return Err(KaidokuError::Zip(
                    "xl/workbook.xml not found in archive".to_string(),
                ))
            }
        };
        let mut xml_content = Vec::new();
        workbook_file.read_to_end(&mut xml_content)?;
        drop(workbook_file);

        use quick_xml::events::Event;
        use quick_xml::Reader;

        let mut reader = Reader::from_reader(xml_content.as_slice());
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    if e.name().as_ref() == b"sheet" {
                        let mut name = None;
                        let mut rel_id = None;

                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| {
                                KaidokuError::Config(format!("XML attribute error: {}", e))
                            })?;
                            match attr.key.as_ref() {
                                b"name" => {
                                    name = Some(std::str::from_utf8(&attr.value)?.to_string());
                                }
                                b"r:id" => {
                                    rel_id = Some(std::str::from_utf8(&attr.value)?.to_string());
                                }
                                _ => {}
                            }
                        }

                        if let Some(name) = name {
                            let part_path = rel_id
                                .and_then(|rid| relationships.get(&rid).cloned())
                                .map(|target| Self::normalize_part_path(&target))
                                .unwrap_or_else(|| {
                                    // リレーションシップが読めない場合は慣例のパスを推測
                                    format!("xl/worksheets/sheet{}.xml", sheets.len() + 1)
                                });
                            sheets.push((name, part_path));
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(KaidokuError::Config(format!("XML parse error: {}", e))),
                _ => {}
            }
        }

        Ok(sheets)
    }

    /// リレーションシップXMLを解析し、Id -> Target のマップを返す
    fn parse_relationships(
        xml_content: &[u8],
    ) -> Result<HashMap<String, String>, KaidokuError> {
        use quick_xml::events::Event;
        use quick_xml::Reader;

        let mut xml_reader = Reader::from_reader(xml_content);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut relationships = HashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    // Event::Emptyは自己終了タグの場合に発生
                    if e.name().as_ref() == b"Relationship" {
                        let mut id = None;
                        let mut target = None;

                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| {
                                KaidokuError::Config(format!("XML attribute error: {}", e))
                            })?;
                            match attr.key.as_ref() {
                                b"Id" => {
                                    id = Some(std::str::from_utf8(&attr.value)?.to_string());
                                }
                                b"Target" => {
                                    target = Some(std::str::from_utf8(&attr.value)?.to_string());
                                }
                                _ => {}
                            }
                        }

                        if let (Some(id_val), Some(target_val)) = (id, target) {
                            relationships.insert(id_val, target_val);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(KaidokuError::Config(format!("XML parse error: {}", e))),
                _ => {}
            }
        }

        Ok(relationships)
    }

    /// リレーションシップターゲットをアーカイブ内パスに正規化
    /// （例: "worksheets/sheet1.xml" -> "xl/worksheets/sheet1.xml"）
    fn normalize_part_path(target: &str) -> String {
        if let Some(stripped) = target.strip_prefix("/") {
            stripped.to_string()
        } else if target.starts_with("xl/") {
            target.to_string()
        } else {
            format!("xl/{}", target)
        }
    }

    /// ワークシートXMLから非表示行・列と書式付きセルを解析
    fn parse_worksheet_xml(
        xml_content: &[u8],
        styles: &StyleTables,
    ) -> Result<WorksheetScan, KaidokuError> {
        use quick_xml::events::Event;
        use quick_xml::Reader;

        let mut xml_reader = Reader::from_reader(xml_content);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut scan = WorksheetScan::default();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    match e.name().as_ref() {
                        b"col" => {
                            // <col min="3" max="3" hidden="1"/>
                            let mut col_min: Option<u32> = None;
                            let mut col_max: Option<u32> = None;
                            let mut is_hidden = false;

                            for attr in e.attributes() {
                                let attr = attr.map_err(|e| {
                                    KaidokuError::Config(format!("XML attribute error: {}", e))
                                })?;
                                match attr.key.as_ref() {
                                    b"min" => {
                                        // Excelの列番号は1始まりなので、0始まりに変換
                                        col_min = Some(
                                            std::str::from_utf8(&attr.value)?.parse::<u32>()? - 1,
                                        );
                                    }
                                    b"max" => {
                                        col_max = Some(
                                            std::str::from_utf8(&attr.value)?.parse::<u32>()? - 1,
                                        );
                                    }
                                    b"hidden" => {
                                        let hidden_str = std::str::from_utf8(&attr.value)?;
                                        is_hidden = hidden_str == "1" || hidden_str == "true";
                                    }
                                    _ => {}
                                }
                            }

                            if is_hidden {
                                if let (Some(min), Some(max)) = (col_min, col_max) {
                                    for col in min..=max {
                                        scan.hidden_cols.insert(col);
                                    }
                                }
                            }
                        }
                        b"row" => {
                            // <row r="15" hidden="1">
                            let mut row_num: Option<u32> = None;
                            let mut is_hidden = false;

                            for attr in e.attributes() {
                                let attr = attr.map_err(|e| {
                                    KaidokuError::Config(format!("XML attribute error: {}", e))
                                })?;
                                match attr.key.as_ref() {
                                    b"r" => {
                                        // Excelの行番号は1始まりなので、0始まりに変換
                                        row_num = Some(
                                            std::str::from_utf8(&attr.value)?.parse::<u32>()? - 1,
                                        );
                                    }
                                    b"hidden" => {
                                        let hidden_str = std::str::from_utf8(&attr.value)?;
                                        is_hidden = hidden_str == "1" || hidden_str == "true";
                                    }
                                    _ => {}
                                }
                            }

                            if is_hidden {
                                if let Some(row) = row_num {
                                    scan.hidden_rows.insert(row);
                                }
                            }
                        }
                        b"c" => {
                            // <c r="A1" s="3" t="s">
                            let mut coord: Option<(u32, u32)> = None;
                            let mut style_id: Option<u32> = None;

                            for attr in e.attributes() {
                                let attr = attr.map_err(|e| {
                                    KaidokuError::Config(format!("XML attribute error: {}", e))
                                })?;
                                match attr.key.as_ref() {
                                    b"r" => {
                                        let ref_str = std::str::from_utf8(&attr.value)?;
                                        coord = parse_cell_ref(ref_str);
                                    }
                                    b"s" => {
                                        style_id =
                                            Some(std::str::from_utf8(&attr.value)?.parse()?);
                                    }
                                    _ => {}
                                }
                            }

                            if let (Some((row, col)), Some(style_id)) = (coord, style_id) {
                                let style = styles.resolve(style_id);
                                if style.is_styled() {
                                    scan.styled_cells.insert((row, col), style);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(KaidokuError::Config(format!("XML parse error: {}", e))),
                _ => {}
            }
        }

        Ok(scan)
    }

    /// ワークシートのリレーションシップから図形・画像パーツ数を数える
    ///
    /// 原則として`xl/worksheets/_rels/sheetN.xml.rels`の`Target`が
    /// drawingsまたはmediaを参照しているものを数えます。
    fn count_sheet_drawings<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        part_path: &str,
    ) -> Result<usize, KaidokuError> {
        let rels_path = match part_path.rfind('/') {
            Some(pos) => format!(
                "{}/_rels/{}.rels",
                &part_path[..pos],
                &part_path[pos + 1..]
            ),
            None => return Ok(0),
        };

        let mut rels_file = match archive.by_name(&rels_path) {
            Ok(file) => file,
            Err(_) => return Ok(0),
        };

        let mut xml_content = Vec::new();
        rels_file.read_to_end(&mut xml_content)?;
        drop(rels_file);

        let relationships = Self::parse_relationships(&xml_content)?;
        let count = relationships
            .values()
            .filter(|target| target.contains("drawings/") || target.contains("media/"))
            .count();

        Ok(count)
    }
}

/// 単一ワークシートXMLの走査結果
#[derive(Debug, Default)]
struct WorksheetScan {
    hidden_rows: BTreeSet<u32>,
    hidden_cols: BTreeSet<u32>,
    styled_cells: HashMap<(u32, u32), CellStyle>,
}

/// セル参照文字列を座標に変換（例: "A1" -> (0, 0)）
pub(crate) fn parse_cell_ref(ref_str: &str) -> Option<(u32, u32)> {
    let mut col_str = String::new();
    let mut row_str = String::new();

    for ch in ref_str.chars() {
        if ch.is_ascii_alphabetic() {
            col_str.push(ch);
        } else if ch.is_ascii_digit() {
            row_str.push(ch);
        }
    }

    if col_str.is_empty() || row_str.is_empty() {
        return None;
    }

    // 列を数値に変換（A=0, B=1, ..., Z=25, AA=26, ...）
    let col = col_str
        .chars()
        .rev()
        .enumerate()
        .map(|(i, ch)| {
            let val = (ch.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
            val * 26_u32.pow(i as u32)
        })
        .sum::<u32>()
        - 1;

    // 行を数値に変換（1始まりなので0始まりに変換）
    let row = row_str.parse::<u32>().ok()? - 1;

    Some((row, col))
}
