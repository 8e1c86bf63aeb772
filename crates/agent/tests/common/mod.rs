//! Shared fixtures for agent integration tests: a provider that replays
//! scripted streams, a human that replays scripted answers, and a view
//! that records what it was shown.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use codeclaw_agent::{AgentLoop, AgentSettings, NoticeLevel, RunView, SystemPromptBuilder};
use codeclaw_config::AppConfig;
use codeclaw_core::agent::{AgentRunState, SafetyLevel};
use codeclaw_core::error::{HumanIoError, ProviderError};
use codeclaw_core::human::HumanIo;
use codeclaw_core::message::{Message, Role, TokenUsage};
use codeclaw_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk, ToolCallDelta, Usage};
use codeclaw_session::InMemorySessionStore;
use tempfile::TempDir;
use tokio::sync::{Notify, mpsc, watch};

pub type Script = Vec<Result<StreamChunk, ProviderError>>;

/// Replays one script per `stream` call and records every request.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
            hold: Mutex::new(None),
        }
    }

    /// Hold the next stream's chunks back until `release` is notified.
    pub fn hold_next(&self, release: Arc<Notify>) {
        *self.hold.lock().unwrap() = Some(release);
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;

        let (tx, rx) = mpsc::channel(script.len().max(1));
        match self.hold.lock().unwrap().take() {
            Some(release) => {
                tokio::spawn(async move {
                    release.notified().await;
                    for item in script {
                        let _ = tx.send(item).await;
                    }
                });
            }
            None => {
                for item in script {
                    tx.try_send(item).unwrap();
                }
            }
        }
        Ok(rx)
    }
}

fn usage_chunk() -> StreamChunk {
    StreamChunk {
        done: true,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        ..Default::default()
    }
}

/// A reply streamed as a few text deltas.
pub fn text_reply(text: &str) -> Script {
    let mid = text.char_indices().nth(text.chars().count() / 2).map_or(0, |(i, _)| i);
    vec![
        Ok(StreamChunk::text(&text[..mid])),
        Ok(StreamChunk::text(&text[mid..])),
        Ok(usage_chunk()),
    ]
}

/// A reply made of tool calls `(id, name, arguments)`, each split across
/// several deltas.
pub fn tool_reply(calls: &[(&str, &str, &str)]) -> Script {
    let mut script = Vec::new();
    for (index, (id, name, arguments)) in calls.iter().enumerate() {
        let index = index as u32;
        let split = name.len() / 2;
        script.push(Ok(StreamChunk {
            tool_calls: vec![ToolCallDelta {
                index,
                id: Some(id.to_string()),
                name: Some(name[..split].to_string()),
                arguments: None,
            }],
            ..Default::default()
        }));
        script.push(Ok(StreamChunk {
            tool_calls: vec![ToolCallDelta {
                index,
                id: None,
                name: Some(name[split..].to_string()),
                arguments: Some(arguments.to_string()),
            }],
            ..Default::default()
        }));
    }
    script.push(Ok(usage_chunk()));
    script
}

pub fn done_reply(summary: &str) -> Script {
    let arguments = serde_json::json!({ "summary": summary }).to_string();
    tool_reply(&[("call_done", "done", &arguments)])
}

/// Answers prompts from a fixed list; records every prompt.
#[derive(Default)]
pub struct ScriptedHuman {
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedHuman {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl HumanIo for ScriptedHuman {
    async fn ask(&self, prompt: &str) -> Result<Option<String>, HumanIoError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let answer = self.answers.lock().unwrap().pop_front().ok_or(HumanIoError::Closed)?;
        let answer = answer.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    }
}

/// Records everything a run shows.
#[derive(Debug, Default)]
pub struct RecordingView {
    pub states: Vec<AgentRunState>,
    pub text: String,
    pub finished_texts: Vec<String>,
    pub aborted: usize,
    pub tools: Vec<(String, bool)>,
    pub notices: Vec<(NoticeLevel, String)>,
    pub usage: Option<(TokenUsage, TokenUsage)>,
}

impl RunView for RecordingView {
    fn state_changed(&mut self, state: AgentRunState) {
        self.states.push(state);
    }
    fn text_delta(&mut self, delta: &str) {
        self.text.push_str(delta);
    }
    fn text_finished(&mut self, text: &str) {
        self.finished_texts.push(text.to_string());
    }
    fn stream_aborted(&mut self) {
        self.aborted += 1;
    }
    fn tool_started(&mut self, _name: &str, _summary: &str) {}
    fn tool_finished(&mut self, name: &str, success: bool, _output: &str) {
        self.tools.push((name.to_string(), success));
    }
    fn notice(&mut self, level: NoticeLevel, text: &str) {
        self.notices.push((level, text.to_string()));
    }
    fn usage(&mut self, run: TokenUsage, session: TokenUsage) {
        self.usage = Some((run, session));
    }
}

pub struct Harness {
    pub agent: AgentLoop,
    pub provider: Arc<ScriptedProvider>,
    pub human: Arc<ScriptedHuman>,
    pub store: Arc<InMemorySessionStore>,
    pub interrupt: watch::Sender<bool>,
    pub dir: TempDir,
}

pub fn harness(scripts: Vec<Script>, answers: &[&str]) -> Harness {
    harness_with(scripts, answers, InMemorySessionStore::new(), |_| {})
}

pub fn harness_with(
    scripts: Vec<Script>,
    answers: &[&str],
    store: InMemorySessionStore,
    configure: impl FnOnce(&mut AgentSettings),
) -> Harness {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::default();
    let tools = Arc::new(codeclaw_tools::default_registry(dir.path(), &config));

    let mut settings = AgentSettings::from_config(&config);
    settings.safety_level = SafetyLevel::Full;
    configure(&mut settings);

    let provider = Arc::new(ScriptedProvider::new(scripts));
    let human = Arc::new(ScriptedHuman::new(answers));
    let store = Arc::new(store);
    let (interrupt, interrupted) = watch::channel(false);
    let agent = AgentLoop::new(
        provider.clone(),
        tools,
        human.clone(),
        store.clone(),
        SystemPromptBuilder::new(dir.path()),
        settings,
    )
    .with_interrupt(interrupted);

    Harness {
        agent,
        provider,
        human,
        store,
        interrupt,
        dir,
    }
}

/// The last message of the `n`th request (0-based).
pub fn last_message(provider: &ScriptedProvider, n: usize) -> Message {
    provider.requests()[n].messages.last().cloned().unwrap()
}

pub fn tool_messages(request: &ProviderRequest) -> Vec<String> {
    request
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.clone())
        .collect()
}
