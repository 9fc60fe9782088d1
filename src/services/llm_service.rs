//! LLM 抽取服务 - 业务能力层
//!
//! 只负责"调用 LLM 拿回原始文本"能力，不解析、不修复、不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）
//!
//! 整卷快速抽取使用 fast 模型，其余策略使用 accurate 模型。

use std::sync::LazyLock;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ExtractionError;
use crate::models::ExtractionStrategy;
use crate::services::extractor::{ExtractionBackend, ExtractionRequest};
use crate::services::prompts;

/// 限流信号
static THROTTLE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b429\b|rate[ _-]?limit|too many requests|quota").ok()
});
/// 服务端建议的等待秒数
static RETRY_AFTER_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:retry[ _-]?after|try again in)\D{0,8}(\d+)").ok()
});

/// LLM 抽取服务
///
/// 职责：
/// - 按策略选择模型和提示词
/// - 把 API 错误分类为 Retryable / Fatal
/// - 只处理单次调用，不重试、不解析
pub struct LlmExtractor {
    client: Client<OpenAIConfig>,
    fast_model: String,
    accurate_model: String,
    max_tokens: u32,
}

impl LlmExtractor {
    /// 创建新的 LLM 抽取服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            fast_model: config.llm_fast_model.clone(),
            accurate_model: config.llm_accurate_model.clone(),
            max_tokens: config.llm_max_tokens,
        }
    }

    fn model_for(&self, strategy: ExtractionStrategy) -> &str {
        match strategy {
            ExtractionStrategy::WholeDocumentFast => &self.fast_model,
            _ => &self.accurate_model,
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// 返回去掉首尾空白的响应内容
    pub async fn send_to_llm(
        &self,
        strategy: ExtractionStrategy,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, ExtractionError> {
        let model = self.model_for(strategy);
        debug!("[{}] 调用 LLM API，模型: {}", strategy, model);
        debug!("[{}] 用户消息长度: {} 字符", strategy, user_message.len());

        let build_error = |e: async_openai::error::OpenAIError| {
            ExtractionError::fatal(strategy, format!("构建请求失败: {}", e))
        };

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(build_error)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(build_error)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(0.1)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(build_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("[{}] LLM API 调用失败: {}", strategy, e);
            classify_api_error(strategy, &e.to_string())
        })?;

        debug!("[{}] LLM API 调用成功", strategy);

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ExtractionError::recoverable(strategy, "LLM 返回内容为空"));
        }
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl ExtractionBackend for LlmExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> Result<String, ExtractionError> {
        let (system_message, user_message) = prompts::build_messages(request);
        self.send_to_llm(request.strategy, &user_message, Some(&system_message))
            .await
    }
}

/// 按错误信息分类：限流为 Retryable，其余为 Fatal
fn classify_api_error(strategy: ExtractionStrategy, message: &str) -> ExtractionError {
    if !is_throttle_message(message) {
        return ExtractionError::fatal(strategy, message);
    }
    ExtractionError::Retryable {
        strategy,
        message: message.to_string(),
        retry_after: parse_retry_after(message),
    }
}

fn is_throttle_message(message: &str) -> bool {
    THROTTLE_RE
        .as_ref()
        .map_or(false, |re| re.is_match(message))
}

fn parse_retry_after(message: &str) -> Option<Duration> {
    let re = RETRY_AFTER_RE.as_ref()?;
    let secs = re.captures(message)?.get(1)?.as_str().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 创建测试用的 LlmExtractor，凭据来自环境变量
    fn create_test_service() -> LlmExtractor {
        LlmExtractor::new(&Config::from_env())
    }

    #[test]
    fn test_throttle_messages_are_retryable() {
        let strategy = ExtractionStrategy::WholeDocumentFast;
        for message in [
            "http error: status 429",
            "Rate limit reached for requests",
            "Too Many Requests",
            "You exceeded your current quota",
        ] {
            assert!(
                matches!(
                    classify_api_error(strategy, message),
                    ExtractionError::Retryable { .. }
                ),
                "{}",
                message
            );
        }
        let err = classify_api_error(strategy, "invalid api key");
        assert!(matches!(err, ExtractionError::Fatal { .. }));
    }

    #[test]
    fn test_retry_after_hint() {
        let err = classify_api_error(
            ExtractionStrategy::AtomicBackground,
            "rate_limit_exceeded: please retry after 20 seconds",
        );
        match err {
            ExtractionError::Retryable { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(20)));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(parse_retry_after("429 Too Many Requests"), None);
    }

    #[test]
    fn test_patterns_compile() {
        assert!(THROTTLE_RE.is_some());
        assert!(RETRY_AFTER_RE.is_some());
        assert!(!is_throttle_message("connection reset"));
    }

    #[test]
    fn test_model_selection() {
        let mut config = Config::default();
        config.llm_fast_model = "fast".to_string();
        config.llm_accurate_model = "accurate".to_string();
        let service = LlmExtractor::new(&config);
        assert_eq!(service.model_for(ExtractionStrategy::WholeDocumentFast), "fast");
        assert_eq!(
            service.model_for(ExtractionStrategy::WholeDocumentAccurate),
            "accurate"
        );
        assert_eq!(service.model_for(ExtractionStrategy::AtomicSubQuestion), "accurate");
    }

    /// 测试通用 LLM 调用
    #[tokio::test]
    #[ignore]
    async fn test_send_to_llm_simple() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = create_test_service();
        let result = service
            .send_to_llm(
                ExtractionStrategy::AtomicBackground,
                "请用一句话介绍你自己",
                Some("你是一个简洁的助手，回答要简短。"),
            )
            .await;

        match result {
            Ok(response) => {
                println!("✅ 通用 LLM 调用成功: {}", response);
                assert!(!response.is_empty());
            }
            Err(e) => panic!("测试失败: {}", e),
        }
    }

    /// 测试整卷抽取并解码
    ///
    /// 运行方式：
    /// ```bash
    /// cargo test test_whole_document_extraction -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_whole_document_extraction() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = create_test_service();
        let request = ExtractionRequest::whole_document(
            ExtractionStrategy::WholeDocumentAccurate,
            "live",
            "第1题\n阅读材料，完成下列要求。\n材料：某地区年降水量较少，蒸发旺盛。\n(1) 说明该地区的气候特征。\n(2) 分析蒸发旺盛的原因。",
        );

        let raw = service.extract(&request).await.unwrap();
        println!("{}", raw);
        let questions = crate::services::response_decoder::decode_questions(
            &raw,
            &crate::repair::RepairEngine::default(),
            request.strategy,
        )
        .unwrap();
        assert!(!questions.is_empty());
    }
}
