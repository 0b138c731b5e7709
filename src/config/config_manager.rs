// ==========================================
// CRM 自动分配系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 说明: 缺失或格式错误的配置回退到默认值,并记录 warn 日志
// ==========================================

use crate::config::scoring_profile::{ScoringProfile, ScoringWeights};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let key = key.trim();
        if key.is_empty() {
            return Err("配置键不能为空".into());
        }

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;

        tracing::info!(config_key = key, "配置已更新");
        Ok(())
    }

    /// 读取并解析配置,缺失或解析失败时返回默认值
    fn get_parsed_or<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 评分配置 =====

    /// 加载评分参数
    ///
    /// 权重为负或合计为 0 时整体回退到默认权重
    pub fn load_scoring_profile(&self) -> Result<ScoringProfile, Box<dyn Error>> {
        let d = ScoringProfile::default();
        let dw = d.weights;

        let weights = ScoringWeights {
            value: self.get_parsed_or(config_keys::WEIGHT_VALUE, dw.value)?,
            engagement: self.get_parsed_or(config_keys::WEIGHT_ENGAGEMENT, dw.engagement)?,
            completeness: self.get_parsed_or(config_keys::WEIGHT_COMPLETENESS, dw.completeness)?,
            recency: self.get_parsed_or(config_keys::WEIGHT_RECENCY, dw.recency)?,
            qualification: self.get_parsed_or(config_keys::WEIGHT_QUALIFICATION, dw.qualification)?,
        };

        let weights_ok = [
            weights.value,
            weights.engagement,
            weights.completeness,
            weights.recency,
            weights.qualification,
        ]
        .iter()
        .all(|w| w.is_finite() && *w >= 0.0)
            && weights.sum() > 0.0;

        let weights = if weights_ok {
            weights
        } else {
            tracing::warn!(?weights, "评分权重配置非法，使用默认权重");
            dw
        };

        let recency_window_days = self
            .get_parsed_or(config_keys::RECENCY_WINDOW_DAYS, d.recency_window_days)?
            .max(1);
        let history_cap = self
            .get_parsed_or(config_keys::HISTORY_CAP, d.history_cap)?
            .max(1);

        Ok(ScoringProfile {
            weights,
            recency_window_days,
            history_cap,
        })
    }

    // ===== 分配配置 =====

    /// 规则未命中时是否启用兜底分配（默认启用）
    pub fn is_fallback_enabled(&self) -> Result<bool, Box<dyn Error>> {
        self.get_parsed_or(config_keys::FALLBACK_ENABLED, true)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 评分权重
    pub const WEIGHT_VALUE: &str = "scoring.weight.value";
    pub const WEIGHT_ENGAGEMENT: &str = "scoring.weight.engagement";
    pub const WEIGHT_COMPLETENESS: &str = "scoring.weight.completeness";
    pub const WEIGHT_RECENCY: &str = "scoring.weight.recency";
    pub const WEIGHT_QUALIFICATION: &str = "scoring.weight.qualification";

    // 评分其他参数
    pub const RECENCY_WINDOW_DAYS: &str = "scoring.recency_window_days";
    pub const HISTORY_CAP: &str = "scoring.history_cap";

    // 分配
    pub const FALLBACK_ENABLED: &str = "assignment.fallback_enabled";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = crate::db::open_in_memory_with_schema().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let cfg = setup();
        assert_eq!(cfg.load_scoring_profile().unwrap(), ScoringProfile::default());
        assert!(cfg.is_fallback_enabled().unwrap());
        assert_eq!(cfg.get_config_snapshot().unwrap(), "{}");
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let cfg = setup();
        cfg.set_config_value(config_keys::WEIGHT_VALUE, "0.5").unwrap();
        cfg.set_config_value(config_keys::HISTORY_CAP, "not-a-number").unwrap();
        cfg.set_config_value(config_keys::FALLBACK_ENABLED, "false").unwrap();

        let profile = cfg.load_scoring_profile().unwrap();
        assert_eq!(profile.weights.value, 0.5);
        assert_eq!(profile.history_cap, 50);
        assert!(!cfg.is_fallback_enabled().unwrap());

        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&cfg.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_negative_weight_falls_back() {
        let cfg = setup();
        cfg.set_config_value(config_keys::WEIGHT_RECENCY, "-1").unwrap();
        let profile = cfg.load_scoring_profile().unwrap();
        assert_eq!(profile.weights, ScoringWeights::default());
    }

    #[test]
    fn test_empty_key_rejected() {
        let cfg = setup();
        assert!(cfg.set_config_value("  ", "1").is_err());
    }
}
