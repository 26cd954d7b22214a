//! # テストユーティリティ
//!
//! ユースケースのテストで使うビルダーを提供する。
//! 結合テストからも使えるよう `test-utils` feature で公開する。

mod notification_test_builder;

pub use notification_test_builder::{NotificationTestBuilder, NotificationTestSetup};
