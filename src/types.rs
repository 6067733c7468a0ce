//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use serde::Serialize;

/// セルの値を表す列挙型
///
/// 正規化テーブル（`Table`）の各セルが保持する型付きの値です。
/// 真偽値やエラー値など、診断ルールが区別しない値はすべて
/// テキストとして取り込まれます。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    Text(String),

    /// 空セル
    Empty,
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// 値を表示用文字列として取得
    pub fn as_display_string(&self) -> String {
        match self {
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Empty => String::new(),
        }
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    pub fn to_a1_notation(&self) -> String {
        let col_str = Self::col_index_to_letter(self.col);
        format!("{}{}", col_str, self.row + 1)
    }

    /// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
    fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}

/// セル範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellRange {
    pub start: CellCoord,
    pub end: CellCoord,
}

impl CellRange {
    /// 新しい範囲を生成
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        Self { start, end }
    }

    /// 指定された座標が範囲内にあるかを判定
    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.row >= self.start.row
            && coord.row <= self.end.row
            && coord.col >= self.start.col
            && coord.col <= self.end.col
    }

    /// 範囲のサイズ（行数 × 列数）を計算
    pub fn size(&self) -> (u32, u32) {
        let rows = self.end.row - self.start.row + 1;
        let cols = self.end.col - self.start.col + 1;
        (rows, cols)
    }

    /// A1形式の範囲文字列に変換（例: "A1:C2"）
    pub fn to_a1_notation(&self) -> String {
        format!(
            "{}:{}",
            self.start.to_a1_notation(),
            self.end.to_a1_notation()
        )
    }
}

/// セル結合範囲の情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRegion {
    /// 結合範囲
    pub range: CellRange,

    /// 親セル（左上セル）の座標
    pub parent: CellCoord,
}

impl MergedRegion {
    /// 新しい結合範囲を生成
    pub fn new(range: CellRange) -> Self {
        Self {
            parent: range.start,
            range,
        }
    }

    /// 指定された座標が結合範囲内にあるかを判定
    pub fn contains(&self, coord: CellCoord) -> bool {
        self.range.contains(coord)
    }
}

/// 構造クエリへの型付き応答
///
/// フォーマットアダプターは、元ファイル形式が表現できない構造情報を
/// 問われた際、既定値ではなく`Unsupported`を返します。チェッカーは
/// この両分岐を必ず処理し、`Unsupported`の場合は対応するルール結果を
/// 「検証不可の警告」に格下げします。`Pass`への暗黙の読み替えは
/// 行いません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability<T> {
    /// 形式が情報を表現でき、値が取得できた
    Supported(T),

    /// 形式がこの構造情報を表現できない（能力ギャップ）
    Unsupported,
}

impl<T> Capability<T> {
    /// 値が取得できたかどうかを判定
    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported(_))
    }

    /// 取得できた値への参照を返す
    pub fn as_supported(&self) -> Option<&T> {
        match self {
            Capability::Supported(value) => Some(value),
            Capability::Unsupported => None,
        }
    }

    /// 値を変換した新しい`Capability`を返す
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Capability<U> {
        match self {
            Capability::Supported(value) => Capability::Supported(f(value)),
            Capability::Unsupported => Capability::Unsupported,
        }
    }
}

/// 入力ファイルの形式タグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileFormat {
    /// カンマ区切りテキスト
    Csv,

    /// 旧バイナリ形式スプレッドシート（OLE2コンテナ）
    Xls,

    /// ZIPベースの現行スプレッドシート（OOXML）
    Xlsx,
}

impl FileFormat {
    /// 形式に対応する標準の拡張子を返す
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Xls => "xls",
            FileFormat::Xlsx => "xlsx",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// セルの書式フラグ
///
/// 元ファイルから抽出した、データの意味づけに使われうる書式情報です。
/// 書式情報を表現できない形式（CSV / XLS）では、テーブル側の
/// 能力フラグが`Unsupported`となり、このフラグは参照されません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CellStyle {
    /// 太字フォントが適用されている
    pub bold: bool,

    /// 背景塗りつぶし（パターンフィル）が適用されている
    pub filled: bool,
}

impl CellStyle {
    /// いずれかの書式が適用されているかを判定
    pub fn is_styled(&self) -> bool {
        self.bold || self.filled
    }
}
