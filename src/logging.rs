//! # Logging モジュール
//!
//! 移動シミュレーションのログ管理機能を提供します。
//!
//! tracing-appenderによる非同期ファイル出力とコンソール出力を組み合わせ、
//! 固定刻みの艦ティックやフレームごとのカメラ更新を大量に記録しても
//! シミュレーション速度に影響しないようにします。
//!
//! ## 設定の優先順位
//!
//! 1. 環境変数 `RUST_LOG`
//! 2. コマンドライン引数（`--log-level`, `--log-output`, `--log-dir`）
//! 3. シナリオファイルの `logging:` セクション
//! 4. 既定値（INFO、コンソールとファイルの両方、`logs/rtsmotion.*`）
//!
//! ## 設定可能な出力先
//!
//! - `Console`: コンソールのみ（compact形式）
//! - `File`: ファイルのみ（JSON形式、日次ローテーション）
//! - `Both`: コンソールとファイルの両方

use std::str::FromStr;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::scenario::LoggingSection;

/// ログ出力先の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogOutput {
    /// コンソールのみ
    Console,
    /// ファイルのみ
    File,
    /// コンソールとファイルの両方
    Both,
}

impl LogOutput {
    pub fn writes_file(&self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(format!("無効な出力先: {}. 利用可能: console, file, both", s)),
        }
    }
}

/// ログ設定構造体
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログレベル
    pub level: Level,
    /// 出力先
    pub output: LogOutput,
    /// ログファイルのディレクトリ（FileまたはBothの場合）
    pub log_dir: String,
    /// ログファイル名のプレフィックス
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Both,
            log_dir: "logs".to_string(),
            file_prefix: "rtsmotion".to_string(),
        }
    }
}

impl LogConfig {
    /// シナリオの `logging:` セクションを既定値に重ねる
    ///
    /// 解釈できない出力先は警告を出して既定値のままにします。
    pub fn from_section(section: &LoggingSection) -> Self {
        let mut config = Self::default();
        if let Some(level) = &section.level {
            config.level = parse_log_level(level);
        }
        if let Some(output) = &section.output {
            match output.parse() {
                Ok(output) => config.output = output,
                Err(e) => eprintln!("警告: {}", e),
            }
        }
        if let Some(dir) = &section.log_dir {
            config.log_dir = dir.clone();
        }
        config
    }
}

/// ログ初期化エラー
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("ログディレクトリを作成できません {0}: {1}")]
    Directory(String, #[source] std::io::Error),
    #[error("ログシステムの初期化に失敗しました: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// ログシステムを初期化
///
/// ファイル出力を伴う場合は非同期書き込みのガードを返します。
/// ガードを破棄すると未書き込みのログが失われるため、`main` の終了まで保持してください。
///
/// # 例
///
/// ```no_run
/// use rtsmotion::logging::{init_logging, LogConfig, LogOutput};
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     output: LogOutput::Console,
///     ..LogConfig::default()
/// };
/// let _guard = init_logging(config)?;
/// # Ok::<(), rtsmotion::logging::LoggingError>(())
/// ```
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    // 環境変数またはconfigからログレベルを設定
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.output.writes_file() {
        ensure_log_directory(&config.log_dir)
            .map_err(|e| LoggingError::Directory(config.log_dir.clone(), e))?;
    }

    match config.output {
        LogOutput::Console => {
            Registry::default()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .try_init()?;
            Ok(None)
        }
        LogOutput::File => {
            let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
            let (writer, guard) = non_blocking(file_appender);

            Registry::default()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .json(),
                )
                .try_init()?;
            Ok(Some(guard))
        }
        LogOutput::Both => {
            let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
            let (writer, guard) = non_blocking(file_appender);

            Registry::default()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .json(),
                )
                .try_init()?;
            Ok(Some(guard))
        }
    }
}

/// ログレベルを文字列から解析
///
/// 無効な文字列の場合は警告を出してINFOを返します。
pub fn parse_log_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!("警告: 無効なログレベル '{}'. INFOを使用します", level_str);
            Level::INFO
        }
    }
}

/// `-v` の指定回数に応じたログレベル
pub fn level_for_verbosity(verbose_level: u8) -> Option<Level> {
    match verbose_level {
        0 => None,
        1 => Some(Level::INFO),
        2 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// ログディレクトリを作成
pub fn ensure_log_directory(log_dir: &str) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(log_dir)?;
    Ok(())
}
