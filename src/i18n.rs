// ==========================================
// CRM 自动分配系统 - 消息本地化
// ==========================================
// 职责: 规则校验错误、分配原因等面向用户的消息
// 语言: zh-CN（默认、兜底）/ en,词条见 locales/*.yml
// 占位符: %{name},由 t_with_args 替换
// 说明: rust_i18n::i18n! 在 lib.rs 中初始化;locale 为进程级全局状态
// ==========================================

pub const DEFAULT_LOCALE: &str = "zh-CN";
pub const SUPPORTED_LOCALES: [&str; 2] = ["zh-CN", "en"];

pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 归一化语言代码: "zh" / "zh_cn" → "zh-CN","en-US" → "en";不支持时返回 None
pub fn normalize_locale(locale: &str) -> Option<&'static str> {
    let lower = locale.trim().to_lowercase().replace('_', "-");
    let primary = lower.split('-').next().unwrap_or_default();
    match primary {
        "zh" => Some("zh-CN"),
        "en" => Some("en"),
        _ => None,
    }
}

/// 切换消息语言,返回实际生效的语言;不支持的语言回退到 zh-CN
pub fn set_locale(locale: &str) -> &'static str {
    let applied = normalize_locale(locale).unwrap_or_else(|| {
        tracing::warn!(locale, fallback = DEFAULT_LOCALE, "不支持的语言，回退到默认语言");
        DEFAULT_LOCALE
    });
    rust_i18n::set_locale(applied);
    applied
}

/// 按 key 取消息,如 `assignment.manual_required`
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 取消息并替换占位符
///
/// ```no_run
/// use crm_assign::i18n::t_with_args;
/// let reason = t_with_args("assignment.member_unavailable", &[("member_id", "7")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    args.iter()
        .fold(t(key), |msg, (name, value)| msg.replace(&format!("%{{{}}}", name), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // locale 为全局状态,本模块测试串行执行
    static LOCALE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("zh"), Some("zh-CN"));
        assert_eq!(normalize_locale(" zh_cn "), Some("zh-CN"));
        assert_eq!(normalize_locale("EN-us"), Some("en"));
        assert_eq!(normalize_locale("fr"), None);
        assert_eq!(normalize_locale(""), None);
        for locale in SUPPORTED_LOCALES {
            assert_eq!(normalize_locale(locale), Some(locale));
        }
    }

    #[test]
    fn test_set_locale_falls_back_to_default() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        assert_eq!(set_locale("en-US"), "en");
        assert_eq!(current_locale(), "en");

        assert_eq!(set_locale("de"), DEFAULT_LOCALE);
        assert_eq!(current_locale(), "zh-CN");
    }

    #[test]
    fn test_rule_validation_messages() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("zh-CN");
        assert_eq!(t("rule.validation.conditions_empty"), "规则至少需要一个条件");
        let msg = t_with_args(
            "rule.validation.condition_operator_invalid",
            &[("index", "2"), ("value", "regex")],
        );
        assert!(msg.contains("条件2"));
        assert!(msg.contains("regex"));

        set_locale("en");
        assert_eq!(t("rule.validation.conditions_empty"), "A rule needs at least one condition");
        assert_eq!(
            t_with_args("rule.validation.entity_type_invalid", &[("value", "opportunity")]),
            "Invalid entity type: opportunity"
        );

        set_locale("zh-CN");
    }

    #[test]
    fn test_assignment_messages() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        assert_eq!(
            t_with_args("assignment.member_unavailable", &[("member_id", "7")]),
            "Member 7 is currently unavailable"
        );

        set_locale("zh-CN");
        assert_eq!(t("assignment.manual_required"), "无规则命中且无可用成员，需人工分配");
    }
}
