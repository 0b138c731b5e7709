// ==========================================
// CRM 自动分配系统 - 性能埋点
// ==========================================
// 职责: 分配/评分/导出等 API 的耗时与 SQL 语句统计,慢 SQL 告警
// 用法: API 入口处 `let _perf = PerfGuard::new("api.bulk_assign");`
// 说明: 计数按线程隔离;仅在存在活跃 PerfGuard 时累计
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const PERF_SQL_ENV: &str = "CRM_ASSIGN_PERF_SQL";
pub const SLOW_SQL_MS_ENV: &str = "CRM_ASSIGN_SLOW_SQL_MS";

const SQL_LOG_MAX_LEN: usize = 420;

static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

/// 当前线程的埋点计数
#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    depth: u32,
    statements: u64,
    slow_statements: u64,
}

thread_local! {
    static COUNTERS: Cell<Counters> = Cell::new(Counters::default());
}

fn update_counters(f: impl FnOnce(&mut Counters)) {
    COUNTERS.with(|cell| {
        let mut counters = cell.get();
        f(&mut counters);
        cell.set(counters);
    });
}

fn read_counters() -> Counters {
    COUNTERS.with(Cell::get)
}

// ==========================================
// PerfSettings - SQL 埋点开关
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfSettings {
    pub enabled: bool,
    pub slow_sql_ms: u64,
}

impl PerfSettings {
    /// Debug 构建默认开启,Release 默认关闭;环境变量优先
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(PERF_SQL_ENV).ok().as_deref(),
            std::env::var(SLOW_SQL_MS_ENV).ok().as_deref(),
        )
    }

    fn from_values(enabled: Option<&str>, slow_sql_ms: Option<&str>) -> Self {
        let enabled = enabled.map_or(cfg!(debug_assertions), is_true);
        let slow_sql_ms = slow_sql_ms
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self { enabled, slow_sql_ms }
    }
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn truncate_sql(sql: &str, max_len: usize) -> String {
    let s = sql.trim().replace('\n', " ");
    match s.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}…", &s[..cut]),
        None => s,
    }
}

/// 按环境变量为连接挂载 SQL 统计（AppState 打开数据库时调用）
pub fn install_sqlite_tracing(conn: &mut Connection) {
    install_with(conn, PerfSettings::from_env());
}

/// 按给定开关挂载;关闭时清除已有回调
pub fn install_with(conn: &mut Connection, settings: PerfSettings) {
    if !settings.enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }
    SLOW_SQL_THRESHOLD_MS.store(settings.slow_sql_ms, Ordering::Relaxed);
    conn.trace(Some(on_statement));
    conn.profile(Some(on_statement_done));
}

fn on_statement(_sql: &str) {
    update_counters(|c| {
        if c.depth > 0 {
            c.statements = c.statements.saturating_add(1);
        }
    });
}

fn on_statement_done(sql: &str, duration: Duration) {
    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }
    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %truncate_sql(sql, SQL_LOG_MAX_LEN),
        "慢 SQL"
    );
    update_counters(|c| {
        if c.depth > 0 {
            c.slow_statements = c.slow_statements.saturating_add(1);
        }
    });
}

// ==========================================
// PerfGuard - API 操作埋点
// ==========================================
// drop 时输出 target="perf" 日志: op / elapsed_ms / sql_count / slow_sql_count
// 可嵌套;外层统计包含内层语句
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    baseline: Counters,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        update_counters(|c| c.depth = c.depth.saturating_add(1));
        Self {
            op,
            start: Instant::now(),
            baseline: read_counters(),
        }
    }

    /// 本 Guard 生效以来当前线程执行的 SQL 语句数
    pub fn statements(&self) -> u64 {
        read_counters()
            .statements
            .saturating_sub(self.baseline.statements)
    }

    fn slow_statements(&self) -> u64 {
        read_counters()
            .slow_statements
            .saturating_sub(self.baseline.slow_statements)
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            sql_count = self.statements(),
            slow_sql_count = self.slow_statements(),
            "操作完成"
        );
        update_counters(|c| c.depth = c.depth.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traced_conn() -> Connection {
        let mut conn = crate::db::open_in_memory_with_schema().unwrap();
        install_with(
            &mut conn,
            PerfSettings {
                enabled: true,
                slow_sql_ms: 0,
            },
        );
        conn
    }

    #[test]
    fn test_settings_from_values() {
        let on = PerfSettings::from_values(Some(" YES "), Some("75"));
        assert!(on.enabled);
        assert_eq!(on.slow_sql_ms, 75);

        let off = PerfSettings::from_values(Some("0"), Some("abc"));
        assert!(!off.enabled);
        assert_eq!(off.slow_sql_ms, if cfg!(debug_assertions) { 50 } else { 200 });

        assert_eq!(PerfSettings::from_values(None, None).enabled, cfg!(debug_assertions));
    }

    #[test]
    fn test_guard_counts_only_its_own_statements() {
        let conn = traced_conn();
        conn.execute_batch("SELECT 1;").unwrap();

        let outer = PerfGuard::new("api.bulk_assign");
        assert_eq!(outer.statements(), 0);
        conn.execute_batch("SELECT 1; SELECT 2;").unwrap();
        let after_outer = outer.statements();
        assert!(after_outer >= 2);

        {
            let inner = PerfGuard::new("api.evaluate_and_assign");
            conn.execute_batch("SELECT 3;").unwrap();
            assert!(inner.statements() >= 1);
        }
        assert!(outer.statements() > after_outer);
    }

    #[test]
    fn test_disabled_tracing_counts_nothing() {
        let mut conn = crate::db::open_in_memory_with_schema().unwrap();
        install_with(
            &mut conn,
            PerfSettings {
                enabled: false,
                slow_sql_ms: 0,
            },
        );
        let guard = PerfGuard::new("api.export_history_csv");
        conn.execute_batch("SELECT 1;").unwrap();
        assert_eq!(guard.statements(), 0);
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(truncate_sql("SELECT 1", 20), "SELECT 1");
        assert_eq!(truncate_sql("SELECT\n*\nFROM t", 8), "SELECT *…");
        assert_eq!(truncate_sql("SELECT '分配规则'", 10), "SELECT '分配…");
    }
}
