//! Loader Module
//!
//! ファイル内容と拡張子から形式を判定し、対応するフォーマットアダプターを
//! 生成するモジュール。CSVについてはテキストエンコーディングの自動判定
//! （UTF-8 → 地域レガシーエンコーディング）も行います。

use calamine::{Reader as CalamineReader, Xls};
use encoding_rs::Encoding;
use std::io::Cursor;
use std::path::Path;

use crate::adapter::{CsvAdapter, FormatAdapter, XlsAdapter, XlsxAdapter};
use crate::error::KaidokuError;
use crate::limits::ResourceLimits;
use crate::types::FileFormat;

/// ZIPコンテナのマジックバイト（XLSX）
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// OLE2コンテナのマジックバイト（XLS）
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// デフォルトのエンコーディング候補リスト（優先順）
pub(crate) fn default_encodings() -> Vec<&'static Encoding> {
    vec![encoding_rs::UTF_8, encoding_rs::SHIFT_JIS, encoding_rs::EUC_JP]
}

/// ファイルローダー
///
/// 1回の診断実行の入力段を担当します。形式判定の優先順位は
/// コンテナのマジックバイトが最優先で、拡張子はマジックが見つからない
/// 場合の補助、最後にテキストヒューリスティクスの順です。
/// 拡張子が実際の内容と食い違っている場合は内容が優先されます。
pub struct Loader {
    /// 資源上限
    limits: ResourceLimits,
    /// CSVエンコーディングの候補リスト（優先順）
    encodings: Vec<&'static Encoding>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(ResourceLimits::default(), default_encodings())
    }
}

impl Loader {
    /// ローダーを生成
    pub fn new(limits: ResourceLimits, encodings: Vec<&'static Encoding>) -> Self {
        Self { limits, encodings }
    }

    /// ファイルを読み込み、アダプターを生成
    ///
    /// # 引数
    ///
    /// * `path` - 入力ファイルのパス
    ///
    /// # 戻り値
    ///
    /// * `Ok(Box<dyn FormatAdapter>)` - 形式判定とアダプター生成に成功した場合
    /// * `Err(KaidokuError)` - I/Oエラー、形式不明、エンコーディング不明など
    pub fn load(&self, path: &Path) -> Result<Box<dyn FormatAdapter>, KaidokuError> {
        let bytes = std::fs::read(path)?;
        let display_name = path.to_string_lossy().into_owned();
        self.load_bytes(bytes, &display_name)
    }

    /// バイト列からアダプターを生成
    ///
    /// # 引数
    ///
    /// * `bytes` - 入力ファイルの全内容
    /// * `display_name` - エラー文脈に使用するファイル名（拡張子判定にも使用）
    pub fn load_bytes(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
    ) -> Result<Box<dyn FormatAdapter>, KaidokuError> {
        if bytes.len() as u64 > self.limits.max_input_file_size {
            return Err(KaidokuError::ResourceLimit(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                bytes.len(),
                self.limits.max_input_file_size
            )));
        }

        let format = self.detect_format(&bytes, display_name)?;
        tracing::info!(file = display_name, format = %format, "format detected");

        let adapter: Box<dyn FormatAdapter> = match format {
            FileFormat::Csv => {
                let decoded = self.decode_text(&bytes, display_name)?;
                Box::new(CsvAdapter::new(&decoded, display_name)?)
            }
            FileFormat::Xls => {
                let workbook =
                    Xls::new(Cursor::new(bytes)).map_err(|e| KaidokuError::Parse(e.into()))?;
                Box::new(XlsAdapter::from_workbook(workbook))
            }
            FileFormat::Xlsx => Box::new(XlsxAdapter::from_bytes(bytes, &self.limits)?),
        };

        // 最低限のシート構造を持たないワークブックは診断不能
        if adapter.sheet_names().is_empty() {
            return Err(KaidokuError::StructuralParse {
                path: display_name.to_string(),
                stage: "load".to_string(),
                message: "workbook contains no sheets".to_string(),
            });
        }

        Ok(adapter)
    }

    /// 形式判定
    ///
    /// マジックバイト（コンテナ形式は必ず持つ）→ 拡張子 →
    /// テキストヒューリスティクスの順で判定します。
    fn detect_format(
        &self,
        bytes: &[u8],
        display_name: &str,
    ) -> Result<FileFormat, KaidokuError> {
        // 1. コンテナのマジックバイト
        if bytes.starts_with(ZIP_MAGIC) {
            return Ok(FileFormat::Xlsx);
        }
        if bytes.starts_with(OLE2_MAGIC) {
            return Ok(FileFormat::Xls);
        }

        // 2. 拡張子（コンテナ形式の拡張子でマジックがない場合は
        //    破損とみなさず、テキストヒューリスティクスに委ねる）
        let extension = Path::new(display_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());
        if extension.as_deref() == Some("csv") {
            return Ok(FileFormat::Csv);
        }

        // 3. テキストヒューリスティクス（区切り文字を含む復号可能テキスト）
        if self.looks_like_delimited_text(bytes) {
            return Ok(FileFormat::Csv);
        }

        Err(KaidokuError::UnsupportedFormat {
            path: display_name.to_string(),
            detail: match extension {
                Some(ext) => format!("extension '.{}' with unrecognized content", ext),
                None => "no extension and unrecognized content".to_string(),
            },
        })
    }

    /// 先頭部分が区切りテキストらしいかどうかの簡易判定
    fn looks_like_delimited_text(&self, bytes: &[u8]) -> bool {
        let head = &bytes[..bytes.len().min(1024)];
        if head.contains(&0u8) {
            return false;
        }
        head.iter()
            .any(|b| matches!(b, b',' | b'\t' | b';' | b'\n'))
    }

    /// CSVのエンコーディング自動判定
    ///
    /// 候補リストを優先順に試し、バイト列全体をエラーなく復号できた
    /// 最初の候補を採用します。どの候補でも復号できない場合は
    /// `UnsupportedEncoding`で失敗します。
    fn decode_text(&self, bytes: &[u8], display_name: &str) -> Result<String, KaidokuError> {
        for encoding in &self.encodings {
            let (decoded, _, had_errors) = encoding.decode(bytes);
            if !had_errors {
                tracing::debug!(
                    file = display_name,
                    encoding = encoding.name(),
                    "encoding detected"
                );
                return Ok(decoded.into_owned());
            }
        }

        Err(KaidokuError::UnsupportedEncoding {
            path: display_name.to_string(),
            tried: self
                .encodings
                .iter()
                .map(|e| e.name())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}
