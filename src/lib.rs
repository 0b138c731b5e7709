// ==========================================
// CRM 自动分配系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 规则分配 / 兜底分配 / 线索评分 / 商机阶段时长
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 规则匹配 / 兜底 / 评分 / 阶段
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// 性能埋点
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    Actor, AssignmentMethod, Availability, ConditionOperator, EntityType, FallbackStrategy,
};

// 领域实体
pub use domain::{
    AssignmentOutcome, AssignmentRecord, AssignmentRule, CrmEntity, Deal, Lead, LeadScoreState,
    RuleDraft, StageHistoryEntry, TeamMember,
};

// 引擎
pub use engine::{
    ConditionMatcher, FallbackAllocator, LeadScoringEngine, RuleEvaluator, RuleStore,
    StageDurationTracker,
};

// API
pub use api::{ApiError, ApiResult, AssignmentApi, CrmEntityApi, DealApi, LeadApi, RuleApi, TeamApi};

// 应用
pub use app::{get_default_db_path, AppState};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "CRM 自动分配系统";
