// ==========================================
// CRM 自动分配系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一个 SQLite 连接（Arc<Mutex<Connection>>）
// ==========================================

use std::sync::{Arc, Mutex};
use rusqlite::Connection;

use crate::api::{AssignmentApi, CrmEntityApi, DealApi, LeadApi, RuleApi, TeamApi};
use crate::config::config_manager::ConfigManager;
use crate::engine::{FallbackAllocator, RuleEvaluator, RuleStore};
use crate::repository::{
    AssignmentHistoryRepository, CrmEntityRepository, SqliteCrmEntityRepository,
    SqliteRuleRepository, SqliteTeamDirectory, TeamDirectory,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径（内存库为 ":memory:"）
    pub db_path: String,

    /// 分配规则API
    pub rule_api: Arc<RuleApi>,

    /// 分配API（自动/人工/批量 + 分配历史）
    pub assignment_api: Arc<AssignmentApi>,

    /// 线索评分API
    pub lead_api: Arc<LeadApi>,

    /// 商机阶段API
    pub deal_api: Arc<DealApi>,

    /// 实体生命周期API
    pub entity_api: Arc<CrmEntityApi>,

    /// 团队成员API
    pub team_api: Arc<TeamApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并确保表结构
    /// 2. 初始化所有Repository与Engine
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::ensure_schema(&conn).map_err(|e| format!("数据库表结构初始化失败: {}", e))?;
        crate::perf::install_sqlite_tracing(&mut conn);

        Self::from_connection(db_path, Arc::new(Mutex::new(conn)))
    }

    /// 内存库（测试 / 演示）
    pub fn in_memory() -> Result<Self, String> {
        let conn = crate::db::open_in_memory_with_schema()
            .map_err(|e| format!("无法创建内存数据库: {}", e))?;
        Self::from_connection(":memory:".to_string(), Arc::new(Mutex::new(conn)))
    }

    /// 基于已建表的共享连接装配
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        // ==========================================
        // 初始化Repository层
        // ==========================================
        let rule_repo = Arc::new(SqliteRuleRepository::new(conn.clone()));
        let entity_repo: Arc<dyn CrmEntityRepository> =
            Arc::new(SqliteCrmEntityRepository::new(conn.clone()));
        let team_directory = Arc::new(SqliteTeamDirectory::new(conn.clone()));
        let team: Arc<dyn TeamDirectory> = team_directory.clone();
        let history_repo = Arc::new(AssignmentHistoryRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let rule_store = Arc::new(RuleStore::new(rule_repo));
        let evaluator = Arc::new(RuleEvaluator::new(rule_store.clone(), team.clone()));
        let fallback = Arc::new(FallbackAllocator::new(team.clone()));

        // ==========================================
        // 初始化API层
        // ==========================================
        let rule_api = Arc::new(RuleApi::new(rule_store));
        let lead_api = Arc::new(LeadApi::new(entity_repo.clone(), config_manager.clone()));
        let deal_api = Arc::new(DealApi::new(entity_repo.clone()));
        let assignment_api = Arc::new(AssignmentApi::new(
            entity_repo.clone(),
            history_repo,
            team,
            evaluator,
            fallback,
            lead_api.clone(),
            config_manager.clone(),
        ));
        let entity_api = Arc::new(CrmEntityApi::new(
            entity_repo,
            assignment_api.clone(),
            lead_api.clone(),
            deal_api.clone(),
        ));
        let team_api = Arc::new(TeamApi::new(team_directory));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            rule_api,
            assignment_api,
            lead_api,
            deal_api,
            entity_api,
            team_api,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 CRM_ASSIGN_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("CRM_ASSIGN_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./crm_assign.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        let dir = data_dir.join("crm-assign-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("crm-assign");

        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("crm_assign.db");
        }
    }

    path.to_string_lossy().to_string()
}
