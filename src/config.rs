use std::str::FromStr;

/// 文档失败后的批处理策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 记录失败，继续处理其余文档
    #[default]
    ContinueOnFailure,
    /// 出现第一个失败后不再启动新的文档
    StopOnFirstFailure,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" | "continue-on-failure" => Ok(FailurePolicy::ContinueOnFailure),
            "stop" | "stop-on-first-failure" => Ok(FailurePolicy::StopOnFirstFailure),
            other => Err(format!("未知的失败策略: {}", other)),
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 原始抽取结果存放目录（.json / .toml）
    pub input_folder: String,
    /// 结构化结果输出目录
    pub output_folder: String,
    /// 诊断文件目录
    pub diagnostic_folder: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 同时处理的文档数量
    pub max_concurrent_documents: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_fast_model: String,
    pub llm_accurate_model: String,
    pub llm_max_tokens: u32,
    // --- 调用节奏 ---
    /// 同一文档相邻两次调用的间隔
    pub inter_call_delay_ms: u64,
    pub rate_limit_base_delay_secs: u64,
    pub rate_limit_max_delay_secs: u64,
    pub rate_limit_max_retries: usize,
    // --- 抽取 ---
    pub repair_attempt_budget: usize,
    /// 标签发现失败时使用的小题标签
    pub default_labels: Vec<String>,
    /// 未指定目标时使用的文档 id 前缀
    pub default_target: Option<String>,
    pub failure_policy: FailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_folder: "raw".to_string(),
            output_folder: "structured".to_string(),
            diagnostic_folder: "failed".to_string(),
            output_log_file: "output.txt".to_string(),
            max_concurrent_documents: 2,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_fast_model: "gpt-4o-mini".to_string(),
            llm_accurate_model: "gpt-4o".to_string(),
            llm_max_tokens: 8192,
            inter_call_delay_ms: 2000,
            rate_limit_base_delay_secs: 15,
            rate_limit_max_delay_secs: 60,
            rate_limit_max_retries: 3,
            repair_attempt_budget: 50,
            default_labels: vec!["(1)".to_string(), "(2)".to_string(), "(3)".to_string()],
            default_target: None,
            failure_policy: FailurePolicy::ContinueOnFailure,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(default.input_folder),
            output_folder: std::env::var("OUTPUT_FOLDER").unwrap_or(default.output_folder),
            diagnostic_folder: std::env::var("DIAGNOSTIC_FOLDER").unwrap_or(default.diagnostic_folder),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            max_concurrent_documents: std::env::var("MAX_CONCURRENT_DOCUMENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_documents),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_fast_model: std::env::var("LLM_FAST_MODEL").unwrap_or(default.llm_fast_model),
            llm_accurate_model: std::env::var("LLM_ACCURATE_MODEL").unwrap_or(default.llm_accurate_model),
            llm_max_tokens: std::env::var("LLM_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_max_tokens),
            inter_call_delay_ms: std::env::var("INTER_CALL_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.inter_call_delay_ms),
            rate_limit_base_delay_secs: std::env::var("RATE_LIMIT_BASE_DELAY_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.rate_limit_base_delay_secs),
            rate_limit_max_delay_secs: std::env::var("RATE_LIMIT_MAX_DELAY_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.rate_limit_max_delay_secs),
            rate_limit_max_retries: std::env::var("RATE_LIMIT_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.rate_limit_max_retries),
            repair_attempt_budget: std::env::var("REPAIR_ATTEMPT_BUDGET").ok().and_then(|v| v.parse().ok()).unwrap_or(default.repair_attempt_budget),
            default_labels: std::env::var("DEFAULT_LABELS").ok().map(|v| parse_labels(&v)).filter(|l| !l.is_empty()).unwrap_or(default.default_labels),
            default_target: std::env::var("DEFAULT_TARGET").ok().filter(|v| !v.trim().is_empty()).or(default.default_target),
            failure_policy: std::env::var("FAILURE_POLICY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.failure_policy),
        }
    }
}

/// 逗号分隔的标签列表
fn parse_labels(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
