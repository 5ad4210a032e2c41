//! Route handlers. Each handler parses its body, delegates to a fallible
//! `handle_*` function and converts any [`Error`] into a response.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info_span, warn, Instrument, Span};

use crate::drivers::content_text;
use crate::logging::{log_payload, log_request_summary, log_response_summary};
use crate::registry;
use crate::stream::{relay_upstream, sse_bytes, ChunkAssembler, ChunkMeta, SSE_DONE};
use crate::tools::{to_chat_completion_tool_calls, Interception, ToolInjector, ToolInterceptor};
use crate::types::openai::{
    AssistantMessage, ChatChoice, ChatCompletion, ChatCompletionRequest, CompletionRequest,
    EmbeddingList, EmbeddingObject, EmbeddingRequest, EmbeddingUsage, FinishReason,
    TextChoice, TextCompletion,
};
use crate::types::upstream::{UpstreamChatRequest, UpstreamEmbedRequest};
use crate::{Error, ErrorContext, Result};

use super::AppState;

const DEFAULT_EMBEDDING_MODEL: &str = "v3small";

pub(crate) async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub(crate) async fn list_models() -> impl IntoResponse {
    Json(registry::models_list(chrono::Utc::now().timestamp()))
}

pub(crate) async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match parse_body::<ChatCompletionRequest>(&body) {
        Ok(request) => handle_chat(&state, &headers, request)
            .await
            .unwrap_or_else(IntoResponse::into_response),
        Err(e) => e.into_response(),
    }
}

pub(crate) async fn completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match parse_body::<CompletionRequest>(&body) {
        Ok(request) => handle_completion(&state, &headers, request)
            .await
            .unwrap_or_else(IntoResponse::into_response),
        Err(e) => e.into_response(),
    }
}

pub(crate) async fn embeddings(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match parse_body::<EmbeddingRequest>(&body) {
        Ok(request) => handle_embeddings(&state, &headers, request)
            .await
            .unwrap_or_else(IntoResponse::into_response),
        Err(e) => e.into_response(),
    }
}

/// Request summary and payload, recorded inside the request's `chat` span.
fn log_chat_request(span: &Span, alias: &str, has_tools: bool, body: &str) {
    span.in_scope(|| {
        log_request_summary("/v1/chat/completions", alias, has_tools);
        log_payload("Chat request", &body);
    });
}

async fn handle_chat(
    state: &AppState,
    headers: &HeaderMap,
    request: ChatCompletionRequest,
) -> Result<Response> {
    let alias = request
        .model
        .clone()
        .unwrap_or_else(|| state.config.default_model.clone());
    let model = registry::lookup_chat_model(&alias)?;
    let family = registry::resolve(model);
    let has_tools = request.has_tools();
    let span = info_span!("chat", model = %alias, family = %family, stream = request.stream);

    log_chat_request(&span, &alias, has_tools, &serde_json::to_string(&request)?);

    let mut messages = request.messages.clone();
    if registry::is_google_model(model) {
        for message in messages.iter_mut() {
            message.flatten_to_text()?;
        }
    }

    let temperature = request.temperature.unwrap_or(state.config.default_temperature);
    let mut upstream_request =
        UpstreamChatRequest::chat(upstream_user(headers, &state.config.default_user), model, messages, temperature)
            .with_stop(request.stop.as_ref())
            .with_max_tokens(request.max_tokens);

    let injector = ToolInjector::new(span.clone());
    let augmentation = injector.prepare_request(&request, family, state.config.tool_mode)?;
    injector.apply(&augmentation, &mut upstream_request);
    let effective_family = augmentation.effective_family(family);

    let meta = ChunkMeta::new(alias.clone());
    let emulate_stream = has_tools || !registry::supports_streaming(model);
    if request.stream && !emulate_stream {
        let upstream = state
            .upstream
            .chat_stream(&upstream_request)
            .instrument(span.clone())
            .await?;
        log_response_summary("streaming", &alias, None);
        return Ok(sse_response(relay_upstream(meta, upstream)));
    }

    let raw = state
        .upstream
        .chat(&upstream_request)
        .instrument(span.clone())
        .await?;
    log_payload("Upstream response", &raw);
    let interception = ToolInterceptor::new(span).process(&raw, effective_family);

    if request.stream {
        let assembler = ChunkAssembler::from_interception(meta, interception);
        log_response_summary("fake-streaming", &alias, Some(finish_label(assembler.finish_reason())));
        return Ok(sse_response(assembler.into_sse_stream()));
    }

    let completion = chat_completion(&meta, interception);
    log_response_summary(
        "success",
        &alias,
        Some(finish_label(completion.choices[0].finish_reason)),
    );
    Ok(Json(completion).into_response())
}

/// Non-streaming chat completion. `content` is null only when the reply is
/// nothing but tool calls.
pub(crate) fn chat_completion(meta: &ChunkMeta, interception: Interception) -> ChatCompletion {
    let Interception {
        tool_calls, text, ..
    } = interception;
    let finish_reason = if tool_calls.is_some() {
        FinishReason::ToolCalls
    } else {
        FinishReason::Stop
    };
    let content = if tool_calls.is_some() && text.is_empty() {
        None
    } else {
        Some(text)
    };
    ChatCompletion {
        id: meta.id.clone(),
        object: "chat.completion".to_string(),
        created: meta.created,
        model: meta.model.clone(),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content,
                tool_calls: tool_calls.as_deref().map(to_chat_completion_tool_calls),
            },
            logprobs: None,
            finish_reason,
        }],
    }
}

async fn handle_completion(
    state: &AppState,
    headers: &HeaderMap,
    request: CompletionRequest,
) -> Result<Response> {
    let alias = request
        .model
        .clone()
        .unwrap_or_else(|| state.config.default_model.clone());
    let model = registry::lookup_chat_model(&alias)?;
    log_request_summary("/v1/completions", &alias, false);

    let temperature = request.temperature.unwrap_or(state.config.default_temperature);
    let upstream_request = UpstreamChatRequest::completion(
        upstream_user(headers, &state.config.default_user),
        model,
        request.prompt.clone(),
        temperature,
    )
    .with_stop(request.stop.as_ref())
    .with_max_tokens(request.max_tokens);

    let raw = state.upstream.chat(&upstream_request).await?;
    log_payload("Upstream response", &raw);

    let completion = TextCompletion {
        id: format!("cmpl-{}", uuid::Uuid::new_v4().simple()),
        object: "text_completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: alias.clone(),
        choices: vec![TextChoice {
            text: response_text(&raw),
            index: 0,
            logprobs: None,
            finish_reason: FinishReason::Stop,
        }],
    };
    log_response_summary("success", &alias, Some("stop"));

    if request.stream {
        let frames = [
            Ok(sse_bytes(&completion)),
            Ok(Bytes::from_static(SSE_DONE.as_bytes())),
        ];
        return Ok(sse_response(stream::iter(frames)));
    }
    Ok(Json(completion).into_response())
}

async fn handle_embeddings(
    state: &AppState,
    headers: &HeaderMap,
    request: EmbeddingRequest,
) -> Result<Response> {
    let alias = request
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
    let model = registry::lookup_embedding_model(&alias)?;
    log_request_summary("/v1/embeddings", &alias, false);

    let user = upstream_user(headers, &state.config.default_user);
    let inputs = request.inputs();
    let mut vectors: Vec<Value> = Vec::with_capacity(inputs.len());
    for batch in inputs.chunks(state.config.upstream.embed_batch_size.max(1)) {
        let body = state
            .upstream
            .embed(&UpstreamEmbedRequest {
                user: user.clone(),
                model: model.to_string(),
                prompt: batch.to_vec(),
            })
            .await?;
        match body.get("embedding") {
            Some(Value::Array(items)) => vectors.extend(items.iter().cloned()),
            _ => warn!(model, batch = batch.len(), "Embedding batch returned no vectors"),
        }
    }

    let list = EmbeddingList {
        object: "list".to_string(),
        data: vectors
            .into_iter()
            .enumerate()
            .map(|(index, embedding)| EmbeddingObject {
                object: "embedding".to_string(),
                embedding,
                index,
            })
            .collect(),
        model: alias,
        usage: EmbeddingUsage::default(),
    };
    Ok(Json(list).into_response())
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        Error::validation_with_context(
            format!("Invalid request body: {}", e),
            ErrorContext::new().with_source("request_parser"),
        )
    })
}

/// Bearer token as upstream user attribution; `noop` and absence fall back
/// to the configured default. Not authentication.
pub(crate) fn upstream_user(headers: &HeaderMap, default_user: &str) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty() && *token != "noop")
        .map(String::from)
        .unwrap_or_else(|| default_user.to_string())
}

/// Plain text of a prompt-style upstream reply.
fn response_text(raw: &Value) -> String {
    match raw.get("response") {
        Some(Value::Object(map)) => content_text(map.get("content")),
        other => content_text(other),
    }
}

fn finish_label(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "stop",
        FinishReason::ToolCalls => "tool_calls",
    }
}

fn sse_response<S>(stream: S) -> Response
where
    S: Stream<Item = std::result::Result<Bytes, Infallible>> + Send + 'static,
{
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tool::ToolCall;
    use axum::http::HeaderValue;
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;

    #[test]
    fn test_upstream_user_from_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(upstream_user(&headers, "bridge"), "bridge");
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer alice"));
        assert_eq!(upstream_user(&headers, "bridge"), "alice");
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer noop"));
        assert_eq!(upstream_user(&headers, "bridge"), "bridge");
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(upstream_user(&headers, "bridge"), "bridge");
    }

    #[test]
    fn test_tool_only_reply_has_null_content() {
        let interception = Interception {
            tool_calls: Some(vec![ToolCall::new("call_1", "f", "{}")]),
            text: String::new(),
            diagnostics: vec![],
        };
        let completion = chat_completion(&ChunkMeta::new("gpt-4o"), interception);
        let v = serde_json::to_value(&completion).unwrap();
        assert!(v["choices"][0]["message"]["content"].is_null());
        assert_eq!(v["choices"][0]["finish_reason"], "tool_calls");
        assert_eq!(v["choices"][0]["message"]["tool_calls"][0]["id"], "call_1");
    }

    #[test]
    fn test_text_reply_omits_tool_calls() {
        let interception = Interception {
            text: "Hello".into(),
            ..Default::default()
        };
        let v = serde_json::to_value(chat_completion(&ChunkMeta::new("m"), interception)).unwrap();
        assert_eq!(v["choices"][0]["message"]["content"], "Hello");
        assert!(v["choices"][0]["message"].get("tool_calls").is_none());
        assert_eq!(v["object"], "chat.completion");
    }

    #[derive(Clone, Default)]
    struct SpanRecorder(Arc<Mutex<Vec<(Level, Option<String>)>>>);

    impl<S> Layer<S> for SpanRecorder
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
            let parent = ctx.event_span(event).map(|span| span.name().to_string());
            self.0.lock().unwrap().push((*event.metadata().level(), parent));
        }
    }

    #[test]
    fn test_chat_request_logs_inside_chat_span() {
        let recorder = SpanRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!("chat", model = "gpt4o");
            log_chat_request(&span, "gpt4o", true, "{\"model\":\"gpt4o\"}");
        });

        let events = recorder.0.lock().unwrap();
        assert!(events.iter().any(|(level, _)| *level == Level::INFO));
        assert!(events.iter().any(|(level, _)| *level == Level::DEBUG));
        assert!(events.iter().all(|(_, parent)| parent.as_deref() == Some("chat")));
    }

    #[test]
    fn test_response_text_shapes() {
        assert_eq!(response_text(&json!({"response": "done"})), "done");
        assert_eq!(response_text(&json!({"response": {"content": "x"}})), "x");
        assert_eq!(response_text(&json!({})), "");
    }
}
