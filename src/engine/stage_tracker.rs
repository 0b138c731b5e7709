// ==========================================
// CRM 自动分配系统 - 阶段时长跟踪
// ==========================================
// 职责: 商机阶段切换记账、阶段时长统计
// 红线: 同一时刻只有最后一条条目未关闭;关闭条目时长恰为 exited_at - entered_at
// 说明: 阶段历史不设上限（与评分历史不同）
// ==========================================

use crate::domain::deal::{Deal, StageDurationStat, StageHistoryEntry};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

// ==========================================
// StageDurationTracker - 阶段时长跟踪器
// ==========================================
pub struct StageDurationTracker;

impl StageDurationTracker {
    /// 阶段切换
    ///
    /// - 新阶段与当前阶段相同: 不变
    /// - 关闭当前未关闭条目（exited_at = now）,追加新阶段的未关闭条目
    ///
    /// # 返回
    /// 更新后的完整阶段历史
    pub fn transition(
        history: &[StageHistoryEntry],
        new_stage: &str,
        now: DateTime<Utc>,
    ) -> Vec<StageHistoryEntry> {
        let mut updated = history.to_vec();

        if let Some(open) = updated.last_mut().filter(|e| e.is_open()) {
            if open.stage == new_stage {
                return updated;
            }
            // 时钟回拨时不产生负时长
            let exited_at = now.max(open.entered_at);
            open.exited_at = Some(exited_at);
            open.duration_ms = (exited_at - open.entered_at).num_milliseconds();
        }

        let entered_at = updated
            .last()
            .and_then(|e| e.exited_at)
            .map_or(now, |exited| now.max(exited));
        updated.push(StageHistoryEntry::open(new_stage, entered_at));
        updated
    }

    /// 按阶段汇总时长
    ///
    /// - 历史平均: 所有已关闭条目
    /// - 当前平均: 处于该阶段的商机的实时停留时长（now - entered_at）,不落库
    pub fn duration_analytics(deals: &[Deal], now: DateTime<Utc>) -> Vec<StageDurationStat> {
        #[derive(Default)]
        struct Acc {
            closed_sum: i64,
            closed_count: usize,
            current_sum: i64,
            current_count: usize,
        }

        let mut by_stage: BTreeMap<&str, Acc> = BTreeMap::new();

        for deal in deals {
            for entry in &deal.stage_history {
                let acc = by_stage.entry(entry.stage.as_str()).or_default();
                if entry.is_open() {
                    acc.current_sum += (now - entry.entered_at).num_milliseconds().max(0);
                    acc.current_count += 1;
                } else {
                    acc.closed_sum += entry.duration_ms;
                    acc.closed_count += 1;
                }
            }
        }

        by_stage
            .into_iter()
            .map(|(stage, acc)| StageDurationStat {
                stage: stage.to_string(),
                avg_historical_ms: average(acc.closed_sum, acc.closed_count),
                closed_count: acc.closed_count,
                avg_current_ms: average(acc.current_sum, acc.current_count),
                current_count: acc.current_count,
            })
            .collect()
    }
}

fn average(sum: i64, count: usize) -> Option<f64> {
    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}
