//! Resource Limits Module
//!
//! ファイル処理時の資源上限とZIPアーカイブの安全性検証を提供するモジュール。
//! ZIP bomb攻撃、パストラバーサル攻撃、巨大ファイルへの対策を提供します。

/// 資源上限の設定
///
/// 1回の診断実行で消費してよい資源の上限を定義します。
/// `max_table_rows`を超える行はテーブル構築から除外され、
/// 切り詰めの通知が診断レポートに記録されます（黙殺はしません）。
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 256MB
    pub max_input_file_size: u64,

    /// ZIPアーカイブ内の最大ファイル数
    /// デフォルト: 10000
    pub max_archive_file_count: usize,

    /// アーカイブ内単一ファイルの最大サイズ（バイト）
    /// デフォルト: 100MB
    pub max_archive_entry_size: u64,

    /// 展開後の最大累計サイズ（バイト）
    /// デフォルト: 1GB
    pub max_decompressed_size: u64,

    /// テーブルに取り込む最大行数（シートごと）
    /// デフォルト: 65536
    pub max_table_rows: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_input_file_size: 268_435_456,     // 256MB
            max_archive_file_count: 10_000,
            max_archive_entry_size: 104_857_600,  // 100MB
            max_decompressed_size: 1_073_741_824, // 1GB
            max_table_rows: 65_536,
        }
    }
}

impl ResourceLimits {
    /// デフォルトの資源上限を作成
    pub fn new() -> Self {
        Self::default()
    }
}

/// ファイルパスの検証
///
/// パストラバーサル攻撃を防ぐため、アーカイブ内のファイルパスを検証します。
///
/// # 引数
///
/// * `path` - 検証するファイルパス
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    // 空のパスは拒否
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // 絶対パスを拒否（Windows形式の`C:\`やUnix形式の`/`で始まるパス）
    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    // `..`を含むパスを拒否（ディレクトリトラバーサル攻撃）
    if path.contains("..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    // `\`を含むパスを拒否（Windows形式のパスセパレータ）
    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = ResourceLimits::new();
        assert_eq!(limits.max_archive_file_count, 10_000);
        assert_eq!(limits.max_table_rows, 65_536);
        assert!(limits.max_input_file_size < limits.max_decompressed_size);
    }

    #[test]
    fn test_validate_zip_path_valid() {
        assert!(validate_zip_path("xl/workbook.xml").is_ok());
        assert!(validate_zip_path("xl/worksheets/sheet1.xml").is_ok());
        assert!(validate_zip_path("xl/drawings/drawing1.xml").is_ok());
    }

    #[test]
    fn test_validate_zip_path_empty() {
        assert!(validate_zip_path("").is_err());
    }

    #[test]
    fn test_validate_zip_path_absolute() {
        assert!(validate_zip_path("/etc/passwd").is_err());
        assert!(validate_zip_path("C:\\Windows\\system32").is_err());
    }

    #[test]
    fn test_validate_zip_path_traversal() {
        assert!(validate_zip_path("../etc/passwd").is_err());
        assert!(validate_zip_path("xl/../../etc/passwd").is_err());
        assert!(validate_zip_path("..").is_err());
    }

    #[test]
    fn test_validate_zip_path_backslash() {
        assert!(validate_zip_path("xl\\workbook.xml").is_err());
    }
}
