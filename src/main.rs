// ==========================================
// CRM 自动分配系统 - 命令行入口
// ==========================================
// 用法:
//   crm-assign [--db <path>] <command>
//
// 命令:
//   stats           分配历史统计
//   rescore         重新计算全部线索评分
//   analytics       商机阶段时长分析
//   export-history  分配历史导出为 CSV（stdout）
//   config          当前配置快照
// ==========================================

use std::io;
use std::process::ExitCode;

use crm_assign::app::{get_default_db_path, AppState};

fn usage() {
    eprintln!("用法: crm-assign [--db <path>] <stats|rescore|analytics|export-history|config>");
}

fn run(state: &AppState, command: &str) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        "stats" => {
            let stats = state.assignment_api.history_stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        "rescore" => {
            let scores = state.lead_api.recalculate_all_scores()?;
            println!("rescored={}", scores.len());
        }
        "analytics" => {
            for stat in state.deal_api.duration_analytics()? {
                println!("{}", serde_json::to_string(&stat)?);
            }
        }
        "export-history" => {
            let written = state.assignment_api.export_history_csv(io::stdout().lock())?;
            tracing::info!(written, "分配历史已导出");
        }
        "config" => {
            println!("{}", state.config_manager.get_config_snapshot()?);
        }
        other => {
            usage();
            return Err(format!("未知命令: {}", other).into());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    crm_assign::logging::init();

    let mut db_path = None;
    let mut command = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => db_path = args.next(),
            "-h" | "--help" => {
                usage();
                return ExitCode::SUCCESS;
            }
            _ => command = Some(arg),
        }
    }

    let Some(command) = command else {
        usage();
        return ExitCode::from(2);
    };

    let db_path = db_path
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(get_default_db_path);

    tracing::info!("{} v{} 使用数据库: {}", crm_assign::APP_NAME, crm_assign::VERSION, db_path);

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("AppState初始化失败: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&state, &command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("命令执行失败: {}", e);
            ExitCode::FAILURE
        }
    }
}
