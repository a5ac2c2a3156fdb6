use std::collections::HashMap;

const EN: &[(&str, &str)] = &[
    // Catalog
    ("no_commands_found", "No commands found"),
    ("parameter_count", "{0} parameter(s) • {1}"),
    ("dangerous_badge", "DANGEROUS"),
    ("unknown_command", "Unknown command id: {0}"),
    // Dispatch
    ("confirm_title", "Confirm Command"),
    ("confirm_prompt", "Run \"{0}\" now? [y/N]: "),
    ("command_cancelled", "Cancelled, nothing was sent"),
    ("command_sent", "Command Sent"),
    ("command_sent_detail", "{0} queued via Discord."),
    ("command_failed", "Command Failed"),
    ("command_failed_http", "Failed with HTTP {0}"),
    ("missing_settings", "Missing Settings"),
    ("missing_endpoint", "Configure the webhook URL first: botctl endpoint set <URL>"),
    ("dispatch_busy", "Another command is still being dispatched"),
    ("history_write_failed", "The command was sent, but saving it to history failed"),
    ("execution_time", "Execution time"),
    // History
    ("history_header", "History (latest first):"),
    ("no_history", "No history records"),
    ("clear_history_prompt", "Clear all {0} history records? [y/N]: "),
    ("history_cleared", "History cleared"),
    ("clear_aborted", "Aborted"),
    // Endpoint
    ("endpoint_saved", "Webhook URL saved (host: {0})"),
    ("endpoint_cleared", "Webhook URL removed"),
    ("endpoint_show", "Webhook configured (host: {0})"),
    ("endpoint_env", "Webhook taken from BOTCTL_WEBHOOK_URL (host: {0})"),
    ("endpoint_none", "No webhook configured"),
    ("invalid_endpoint", "Invalid webhook URL: {0}"),
];

const ZH: &[(&str, &str)] = &[
    ("no_commands_found", "未找到命令"),
    ("parameter_count", "{0} 个参数 • {1}"),
    ("dangerous_badge", "危险"),
    ("unknown_command", "未知命令 ID: {0}"),
    ("confirm_title", "确认命令"),
    ("confirm_prompt", "现在执行 \"{0}\"? [y/N]: "),
    ("command_cancelled", "已取消，未发送任何内容"),
    ("command_sent", "命令已发送"),
    ("command_sent_detail", "{0} 已通过 Discord 排队。"),
    ("command_failed", "命令失败"),
    ("command_failed_http", "失败，HTTP {0}"),
    ("missing_settings", "缺少设置"),
    ("missing_endpoint", "请先配置 Webhook 地址: botctl endpoint set <URL>"),
    ("dispatch_busy", "另一个命令仍在发送中"),
    ("history_write_failed", "命令已发送，但保存历史记录失败"),
    ("execution_time", "执行时间"),
    ("history_header", "历史记录 (最新在前):"),
    ("no_history", "没有历史记录"),
    ("clear_history_prompt", "清除全部 {0} 条历史记录? [y/N]: "),
    ("history_cleared", "历史记录已清除"),
    ("clear_aborted", "已中止"),
    ("endpoint_saved", "Webhook 地址已保存 (主机: {0})"),
    ("endpoint_cleared", "Webhook 地址已删除"),
    ("endpoint_show", "已配置 Webhook (主机: {0})"),
    ("endpoint_env", "Webhook 来自 BOTCTL_WEBHOOK_URL (主机: {0})"),
    ("endpoint_none", "未配置 Webhook"),
    ("invalid_endpoint", "无效的 Webhook 地址: {0}"),
];

pub struct I18n {
    translations: HashMap<&'static str, HashMap<&'static str, &'static str>>,
    current_lang: &'static str,
}

impl I18n {
    pub fn new(lang: &str) -> Self {
        let mut translations = HashMap::new();
        translations.insert("en", EN.iter().copied().collect());
        translations.insert("zh", ZH.iter().copied().collect());

        let current_lang = if lang.starts_with("zh") || lang == "cn" || lang == "chinese" {
            "zh"
        } else {
            "en"
        };

        Self {
            translations,
            current_lang,
        }
    }

    /// Falls back to English, then to the key itself.
    pub fn t(&self, key: &str) -> String {
        [self.current_lang, "en"]
            .iter()
            .find_map(|lang| self.translations.get(lang)?.get(key))
            .map(|value| value.to_string())
            .unwrap_or_else(|| key.to_string())
    }

    pub fn t_format(&self, key: &str, args: &[&str]) -> String {
        let mut result = self.t(key);
        for (i, arg) in args.iter().enumerate() {
            result = result.replace(&format!("{{{}}}", i), arg);
        }
        result
    }
}
