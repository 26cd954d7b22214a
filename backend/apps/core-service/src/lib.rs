//! # Core Service ライブラリ
//!
//! 通知ディスパッチと、通知を発生させるチケット・ユーザーのユースケースを公開する。
//! テスト用に内部モジュールへのアクセスを提供する。

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod usecase;

// テストユーティリティ（内部実装、ドキュメントからは隠す）
#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod test_utils;
