//! ballot-core
//!
//! スプレッドシートとチャットの poll を同期して、メンバー投票を自動化するコア。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, row, schema, tally, outcome, state, events, errors）
//! - **ports**: 抽象化レイヤー（SheetClient, ChatClient, Clock, OutcomeEvaluator）
//! - **sheet**: レート制限付きのシートアクセス（RequestOrder, スナップショット, 変更検出）
//! - **formula**: 判定式の字句解析・構文解析・評価
//! - **app**: アプリケーションロジック（builder, poll_manager, refresh_loop, service）
//! - **config**: JSON 設定
//! - **impls**: 実装（InMemorySheet / InMemoryChat など開発用）
//!
//! # 流れ
//! RefreshLoop が一定間隔でシートを読み、ChangeDetector がイベントを作り、
//! PollManager がチャットに poll を出して、結果をシートに書き戻す。
//! シートへのアクセスはすべて 1 本の FIFO（RequestOrder）を通る。

pub mod app;
pub mod config;
pub mod domain;
pub mod formula;
pub mod impls;
pub mod ports;
pub mod sheet;
