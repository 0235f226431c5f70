//! OutcomeEvaluator port - 票数から OutcomeCode を決める
//!
//! 純粋関数として設計（副作用なし）。
//! 実装は `formula::FormulaEvaluator`（設定された式を評価する）。

use crate::domain::{OutcomeCode, VoteTally};

/// OutcomeEvaluator は票数と経過フラグから OutcomeCode を生成
///
/// # 設計原則
/// - 純粋関数（tally + time_passed → outcome）
/// - 不明な結果は WAIT_DECLINE に正規化して返す（呼び出し側は常に有効なコードを受け取る）
pub trait OutcomeEvaluator: Send + Sync {
    fn evaluate(&self, tally: &VoteTally, time_passed: bool) -> OutcomeCode;
}
