use std::{env, sync::OnceLock};

use crate::CoreError;
use anyhow::Error as AnyhowError;
use clap::{Command, builder::Arg};
use locale_config::Locale;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    English,
    SimplifiedChinese,
    TraditionalChinese,
    Japanese,
}

const PLACEHOLDER_PREFIX: &str = "i18n:";
const LANGUAGE_ENV_KEY: &str = "PO_SYNC_LANG";

static LANGUAGE: OnceLock<Language> = OnceLock::new();
static MESSAGES: OnceLock<Messages> = OnceLock::new();

fn interpolate(template: &str, values: &[(&str, String)]) -> String {
    let mut result = template.to_owned();
    for (key, value) in values {
        let placeholder = format!("{{{key}}}");
        result = result.replace(&placeholder, value);
    }
    result
}

pub fn language() -> Language {
    *LANGUAGE.get_or_init(detect_language)
}

pub fn messages() -> &'static Messages {
    MESSAGES.get_or_init(|| Messages { language: language() })
}

fn detect_language() -> Language {
    if let Ok(value) = env::var(LANGUAGE_ENV_KEY) {
        if let Some(lang) = parse_language_tag(&value) {
            return lang;
        }
    }

    let locale = Locale::user_default();
    for (_category, tag) in locale.tags() {
        if let Some(lang) = parse_language_tag(tag.as_ref()) {
            return lang;
        }
    }

    Language::English
}

/// Locale prefixes in match order; the first hit wins.
const LOCALE_PREFIXES: &[(&str, Language)] = &[
    ("ja", Language::Japanese),
    ("zh-hant", Language::TraditionalChinese),
    ("zh-tw", Language::TraditionalChinese),
    ("zh-hk", Language::TraditionalChinese),
    ("zh-mo", Language::TraditionalChinese),
    ("zh-hans", Language::SimplifiedChinese),
    ("zh-cn", Language::SimplifiedChinese),
    ("zh-sg", Language::SimplifiedChinese),
    ("en", Language::English),
];

fn parse_language_tag(raw: &str) -> Option<Language> {
    // `LC_ALL=pt_BR.UTF-8@euro` style values reduce to `pt-br`.
    let value = raw.rsplit('=').next().unwrap_or(raw).trim();
    let base = value.split(['.', '@']).next().unwrap_or(value);
    let tag = base.replace('_', "-").to_ascii_lowercase();

    if tag == "zh" {
        return Some(Language::SimplifiedChinese);
    }
    let subtag_prefix = |prefix: &str| {
        tag.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
    };
    LOCALE_PREFIXES
        .iter()
        .find(|(prefix, _)| subtag_prefix(prefix))
        .map(|(_, language)| *language)
        .or_else(|| tag.starts_with("zh-").then_some(Language::TraditionalChinese))
}

pub struct Messages {
    language: Language,
}

impl Messages {
    pub fn for_language(language: Language) -> Self {
        Self { language }
    }

    pub fn error_prefix(&self) -> &'static str {
        self.text("errors.prefix")
    }

    pub fn language_count(&self, count: usize) -> String {
        interpolate(self.text("summary.languages"), &[("count", count.to_string())])
    }

    pub fn failed_languages(&self, codes: &str) -> String {
        interpolate(self.text("summary.failed"), &[("codes", codes.to_string())])
    }

    pub fn mode_required(&self) -> &'static str {
        self.text("errors.mode_required")
    }

    pub fn done(&self) -> &'static str {
        self.text("summary.done")
    }

    pub fn delete_warning(&self, project: &str) -> String {
        interpolate(self.text("delete.warning"), &[("project", project.to_string())])
    }

    pub fn delete_prompt(&self) -> &'static str {
        self.text("delete.prompt")
    }

    pub fn delete_cancelled(&self) -> &'static str {
        self.text("delete.cancelled")
    }

    pub fn render_anyhow(&self, err: &AnyhowError) -> String {
        match err.chain().find_map(|cause| cause.downcast_ref::<CoreError>()) {
            Some(core) => self.render_core_error(core),
            None => err.chain().map(ToString::to_string).collect::<Vec<_>>().join(": "),
        }
    }

    fn render_core_error(&self, error: &CoreError) -> String {
        let message = self.text(error.message_key());
        let placeholders = error.placeholders();
        interpolate(message, &placeholders)
    }

    fn text(&self, key: &str) -> &'static str {
        match self.language {
            Language::English => english_text(key),
            Language::SimplifiedChinese => zh_hans_text(key).unwrap_or_else(|| english_text(key)),
            Language::TraditionalChinese => zh_hant_text(key).unwrap_or_else(|| english_text(key)),
            Language::Japanese => ja_text(key).unwrap_or_else(|| english_text(key)),
        }
    }

    pub fn translate_placeholder(&self, candidate: &str) -> Option<&'static str> {
        let key = candidate.trim().strip_prefix(PLACEHOLDER_PREFIX)?;
        Some(self.text(key))
    }
}

pub fn localize_command(mut command: Command, messages: &Messages) -> Command {
    if let Some(about) = command
        .get_about()
        .and_then(|styled| messages.translate_placeholder(&styled.to_string()))
    {
        command = command.about(about);
    }
    if let Some(long_about) = command
        .get_long_about()
        .and_then(|styled| messages.translate_placeholder(&styled.to_string()))
    {
        command = command.long_about(long_about);
    }

    command = command.mut_args(|arg| localize_arg(arg, messages));
    command = command.mut_subcommands(|sub| localize_command(sub, messages));
    command
}

fn localize_arg(mut arg: Arg, messages: &Messages) -> Arg {
    if let Some(help) = arg
        .get_help()
        .and_then(|styled| messages.translate_placeholder(&styled.to_string()))
    {
        arg = arg.help(help);
    }

    if let Some(long_help) = arg
        .get_long_help()
        .and_then(|styled| messages.translate_placeholder(&styled.to_string()))
    {
        arg = arg.long_help(long_help);
    }

    arg
}

fn english_text(key: &str) -> &'static str {
    match key {
        "cli.about" => "Synchronize gettext catalogs with a POEditor project.",
        "cli.version_flag_help" => "Show version information and exit.",
        "cli.verbose_help" => "Log every step (same as RUST_LOG=po_sync=debug).",
        "args.token" => "POEditor API token (or set POEDITOR_API_TOKEN).",
        "args.token_file" => "File holding the API token. Defaults to <root>/.poeditor_apitoken.",
        "args.name" => "Project name on POEditor and below the root. Defaults to 'subdownloader'.",
        "args.fixed" => {
            "Reconciliation rules file (TOML or JSON). Defaults to <root>/poeditor_fixes.toml."
        }
        "args.languages" => "Only touch these languages (local or remote codes).",
        "args.sort" => {
            "Sort by local code (l), server code (s), name (n), completion (p) or update time (t)."
        }
        "args.reverse" => "Reverse the order.",
        "args.upload" => "Upload local catalogs to POEditor.",
        "args.download" => "Download catalogs from POEditor and merge them locally.",
        "args.delete" => "Delete languages from the POEditor project.",
        "args.status" => "Print the sync status table.",
        "args.root" => "Directory holding the project tree. Defaults to the current directory.",
        "args.api_url" => "Base URL of the POEditor API (or set PO_SYNC_API_URL).",
        "args.msgcat" => "msgcat program used to merge catalogs.",
        "args.upload_interval" => "Seconds to wait between two uploads. Defaults to 20.",
        "args.log_file" => "Also write JSON log records to this file.",
        "errors.prefix" => "Error:",
        "errors.mode_required" => {
            "One of --upload, --download, --delete or --status is required."
        }
        "summary.languages" => "Number of languages: {count}",
        "summary.failed" => "Failed languages: {codes}",
        "summary.done" => "Done",
        "delete.warning" => {
            "Are you sure you want to delete languages of '{project}' from the server?"
        }
        "delete.prompt" => "Enter the name of the project to confirm: ",
        "delete.cancelled" => "Wrong name. Canceling",
        "core.project_not_found" => "Project '{name}' not found on the server.",
        "core.language_not_found" => "Language '{code}' not found.",
        "core.language_not_local" => "Language '{code}' has no local catalog to upload.",
        "core.invalid_sort_spec" => {
            "Invalid sort specification '{spec}'. Use one of l, s, n, p, t, optionally with r."
        }
        "core.create_dir_failed" => "Failed to create directory {path}: {error}",
        "core.read_dir_failed" => "Failed to read directory {path}: {error}",
        "core.install_catalog_failed" => "Failed to install catalog {from} as {to}: {error}",
        "core.read_rules_failed" => "Failed to read reconciliation rules {path}: {error}",
        "core.parse_rules_toml_failed" => "Failed to parse TOML rules at {path}: {error}",
        "core.parse_rules_json_failed" => "Failed to parse JSON rules at {path}: {error}",
        "core.invalid_rule" => "Rule '{key}' in {path} must map to a string.",
        "core.read_token_failed" => "Failed to read API token file {path}: {error}",
        "core.token_missing" => {
            "No API token given. Use --token, POEDITOR_API_TOKEN or the file {path}."
        }
        "core.token_empty" => "The API token is empty.",
        "core.invalid_api_url" => "Invalid API URL '{url}': {error}",
        "core.merge_spawn_failed" => "Failed to run merge tool {program}: {error}",
        "core.merge_failed" => "Merge tool {program} failed on {path} ({status}).",
        _ => panic!("missing English text for key '{key}'"),
    }
}

fn zh_hans_text(key: &str) -> Option<&'static str> {
    Some(match key {
        "cli.about" => "将 gettext 翻译目录与 POEditor 项目同步。",
        "cli.version_flag_help" => "显示版本信息并退出。",
        "cli.verbose_help" => "记录每一步操作（等同于 RUST_LOG=po_sync=debug）。",
        "args.token" => "POEditor API 令牌（或设置 POEDITOR_API_TOKEN）。",
        "args.token_file" => "保存 API 令牌的文件，默认为 <root>/.poeditor_apitoken。",
        "args.name" => "POEditor 上及根目录下的项目名称，默认为 'subdownloader'。",
        "args.fixed" => "语言代码对照规则文件（TOML 或 JSON），默认为 <root>/poeditor_fixes.toml。",
        "args.languages" => "只处理这些语言（本地或远程代码）。",
        "args.sort" => "按本地代码 (l)、服务器代码 (s)、名称 (n)、完成度 (p) 或更新时间 (t) 排序。",
        "args.reverse" => "倒序排列。",
        "args.upload" => "将本地翻译目录上传到 POEditor。",
        "args.download" => "从 POEditor 下载翻译目录并在本地合并。",
        "args.delete" => "从 POEditor 项目中删除语言。",
        "args.status" => "打印同步状态表。",
        "args.root" => "项目目录所在的根目录，默认为当前目录。",
        "args.api_url" => "POEditor API 的基础 URL（或设置 PO_SYNC_API_URL）。",
        "args.msgcat" => "用于合并翻译目录的 msgcat 程序。",
        "args.upload_interval" => "两次上传之间等待的秒数，默认为 20。",
        "args.log_file" => "同时将 JSON 日志写入此文件。",
        "errors.prefix" => "错误：",
        "errors.mode_required" => "必须指定 --upload、--download、--delete 或 --status 之一。",
        "summary.languages" => "语言数量：{count}",
        "summary.failed" => "失败的语言：{codes}",
        "summary.done" => "完成",
        "delete.warning" => "确定要从服务器删除项目 '{project}' 的语言吗？",
        "delete.prompt" => "请输入项目名称以确认：",
        "delete.cancelled" => "名称不正确，已取消",
        "core.project_not_found" => "服务器上找不到项目 '{name}'。",
        "core.language_not_found" => "找不到语言 '{code}'。",
        "core.language_not_local" => "语言 '{code}' 没有可上传的本地翻译目录。",
        "core.invalid_sort_spec" => "无效的排序方式 '{spec}'。可用 l、s、n、p、t，并可加 r。",
        "core.create_dir_failed" => "创建目录 {path} 失败：{error}",
        "core.read_dir_failed" => "读取目录 {path} 失败：{error}",
        "core.install_catalog_failed" => "无法将翻译目录 {from} 安装为 {to}：{error}",
        "core.read_rules_failed" => "读取对照规则 {path} 失败：{error}",
        "core.parse_rules_toml_failed" => "无法解析 {path} 中的 TOML 规则：{error}",
        "core.parse_rules_json_failed" => "无法解析 {path} 中的 JSON 规则：{error}",
        "core.invalid_rule" => "{path} 中的规则 '{key}' 必须对应一个字符串。",
        "core.read_token_failed" => "读取 API 令牌文件 {path} 失败：{error}",
        "core.token_missing" => "未提供 API 令牌。请使用 --token、POEDITOR_API_TOKEN 或文件 {path}。",
        "core.token_empty" => "API 令牌为空。",
        "core.invalid_api_url" => "无效的 API URL '{url}'：{error}",
        "core.merge_spawn_failed" => "无法运行合并工具 {program}：{error}",
        "core.merge_failed" => "合并工具 {program} 处理 {path} 失败（{status}）。",
        _ => return None,
    })
}

fn zh_hant_text(key: &str) -> Option<&'static str> {
    Some(match key {
        "cli.about" => "將 gettext 翻譯目錄與 POEditor 專案同步。",
        "cli.version_flag_help" => "顯示版本資訊並結束。",
        "cli.verbose_help" => "記錄每一步操作（等同於 RUST_LOG=po_sync=debug）。",
        "args.token" => "POEditor API 權杖（或設定 POEDITOR_API_TOKEN）。",
        "args.token_file" => "儲存 API 權杖的檔案，預設為 <root>/.poeditor_apitoken。",
        "args.name" => "POEditor 上及根目錄下的專案名稱，預設為 'subdownloader'。",
        "args.fixed" => "語言代碼對照規則檔（TOML 或 JSON），預設為 <root>/poeditor_fixes.toml。",
        "args.languages" => "只處理這些語言（本機或遠端代碼）。",
        "args.sort" => "依本機代碼 (l)、伺服器代碼 (s)、名稱 (n)、完成度 (p) 或更新時間 (t) 排序。",
        "args.reverse" => "反向排序。",
        "args.upload" => "將本機翻譯目錄上傳至 POEditor。",
        "args.download" => "從 POEditor 下載翻譯目錄並在本機合併。",
        "args.delete" => "從 POEditor 專案中刪除語言。",
        "args.status" => "列印同步狀態表。",
        "args.root" => "專案目錄所在的根目錄，預設為目前目錄。",
        "args.api_url" => "POEditor API 的基礎 URL（或設定 PO_SYNC_API_URL）。",
        "args.msgcat" => "用於合併翻譯目錄的 msgcat 程式。",
        "args.upload_interval" => "兩次上傳之間等待的秒數，預設為 20。",
        "args.log_file" => "同時將 JSON 日誌寫入此檔案。",
        "errors.prefix" => "錯誤：",
        "errors.mode_required" => "必須指定 --upload、--download、--delete 或 --status 之一。",
        "summary.languages" => "語言數量：{count}",
        "summary.failed" => "失敗的語言：{codes}",
        "summary.done" => "完成",
        "delete.warning" => "確定要從伺服器刪除專案 '{project}' 的語言嗎？",
        "delete.prompt" => "請輸入專案名稱以確認：",
        "delete.cancelled" => "名稱不正確，已取消",
        "core.project_not_found" => "伺服器上找不到專案 '{name}'。",
        "core.language_not_found" => "找不到語言 '{code}'。",
        "core.language_not_local" => "語言 '{code}' 沒有可上傳的本機翻譯目錄。",
        "core.invalid_sort_spec" => "無效的排序方式 '{spec}'。可用 l、s、n、p、t，並可加 r。",
        "core.create_dir_failed" => "建立目錄 {path} 失敗：{error}",
        "core.read_dir_failed" => "讀取目錄 {path} 失敗：{error}",
        "core.install_catalog_failed" => "無法將翻譯目錄 {from} 安裝為 {to}：{error}",
        "core.read_rules_failed" => "讀取對照規則 {path} 失敗：{error}",
        "core.token_missing" => "未提供 API 權杖。請使用 --token、POEDITOR_API_TOKEN 或檔案 {path}。",
        "core.token_empty" => "API 權杖為空。",
        "core.merge_spawn_failed" => "無法執行合併工具 {program}：{error}",
        "core.merge_failed" => "合併工具 {program} 處理 {path} 失敗（{status}）。",
        other => return Some(english_text(other)),
    })
}

fn ja_text(key: &str) -> Option<&'static str> {
    Some(match key {
        "cli.about" => "gettext の翻訳カタログを POEditor プロジェクトと同期します。",
        "cli.version_flag_help" => "バージョン情報を表示して終了します。",
        "cli.verbose_help" => "すべての処理をログに記録します（RUST_LOG=po_sync=debug と同じ）。",
        "args.token" => "POEditor API トークン（または POEDITOR_API_TOKEN を設定）。",
        "args.token_file" => "API トークンを保存したファイル。既定は <root>/.poeditor_apitoken。",
        "args.name" => "POEditor 上およびルート直下のプロジェクト名。既定は 'subdownloader'。",
        "args.languages" => "指定した言語のみを処理します（ローカルまたはリモートのコード）。",
        "args.reverse" => "順序を逆にします。",
        "args.upload" => "ローカルのカタログを POEditor にアップロードします。",
        "args.download" => "POEditor からカタログをダウンロードしてローカルにマージします。",
        "args.delete" => "POEditor プロジェクトから言語を削除します。",
        "args.status" => "同期状態の表を表示します。",
        "errors.prefix" => "エラー:",
        "summary.languages" => "言語数: {count}",
        "summary.failed" => "失敗した言語: {codes}",
        "summary.done" => "完了",
        "delete.warning" => "プロジェクト「{project}」の言語をサーバーから削除してもよろしいですか？",
        "delete.prompt" => "確認のためプロジェクト名を入力してください: ",
        "delete.cancelled" => "名前が一致しません。キャンセルしました",
        "core.project_not_found" => "サーバー上にプロジェクト「{name}」が見つかりません。",
        "core.language_not_found" => "言語「{code}」が見つかりません。",
        "core.language_not_local" => "言語「{code}」にはアップロードするローカルカタログがありません。",
        "core.create_dir_failed" => "ディレクトリ {path} の作成に失敗しました: {error}",
        "core.read_dir_failed" => "ディレクトリ {path} の読み取りに失敗しました: {error}",
        "core.token_missing" => {
            "API トークンがありません。--token、POEDITOR_API_TOKEN またはファイル {path} を使用してください。"
        }
        "core.token_empty" => "API トークンが空です。",
        "core.merge_spawn_failed" => "マージツール {program} を実行できませんでした: {error}",
        other => return Some(english_text(other)),
    })
}
