//! The agent turn loop.
//!
//! One user input drives alternating model calls and tool dispatch until the
//! model answers without requesting tools, the round limit trips, or the
//! turn is cancelled. Two invariants hold throughout: the turn log is
//! append-only, and every tool call the model makes is answered exactly once
//! before the next model call.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::conversation::{ConversationState, Turn};
use crate::llm::LLMClient;
use crate::llm::provider::ToolCall;
use crate::session::SessionStore;
use crate::tools::executor::{ToolExecutor, ToolOutcome, ToolResultStatus};
use crate::tools::registry::ToolRegistry;

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// The model produced a final text answer.
    Completed,
    /// Cancellation, a terminal model error, or the round limit stopped the
    /// turn early.
    Aborted,
}

/// Result of driving one user input to quiescence.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub final_text: String,
    pub phase: LoopPhase,
    pub rounds: usize,
}

pub struct AgentRunner {
    client: LLMClient,
    registry: Arc<ToolRegistry>,
    executor: ToolExecutor,
    store: Arc<dyn SessionStore>,
    conversation: ConversationState,
    system_prompt: String,
    max_rounds: usize,
}

impl AgentRunner {
    pub fn new(
        client: LLMClient,
        registry: Arc<ToolRegistry>,
        executor: ToolExecutor,
        store: Arc<dyn SessionStore>,
        session_id: impl Into<String>,
        system_prompt: impl Into<String>,
        max_rounds: usize,
    ) -> Result<Self> {
        let session_id = session_id.into();
        let turns = store.load(&session_id)?;
        if !turns.is_empty() {
            info!(session = %session_id, turns = turns.len(), "resuming session");
        }
        let conversation =
            ConversationState::with_turns(session_id, client.model().to_owned(), turns);
        Ok(Self {
            client,
            registry,
            executor,
            store,
            conversation,
            system_prompt: system_prompt.into(),
            max_rounds,
        })
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        self.conversation.model = model.clone();
        self.client.set_model(model);
    }

    /// Wipe the stored transcript and start this session fresh.
    pub fn clear(&mut self) -> Result<()> {
        self.store.clear(&self.conversation.session_id)?;
        self.conversation.turns.clear();
        self.conversation.usage = Default::default();
        Ok(())
    }

    /// Drive one user input until the model stops requesting tools.
    pub async fn run_turn(
        &mut self,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        self.record(Turn::user(user_text));
        let tools = self.registry.definitions();
        let mut rounds = 0;

        loop {
            if rounds >= self.max_rounds {
                let note = format!(
                    "Stopped after {} rounds without a final answer. Ask again to continue.",
                    self.max_rounds
                );
                warn!(rounds, "round limit reached, aborting turn");
                self.record(Turn::assistant(&note));
                return Ok(TurnOutcome {
                    final_text: note,
                    phase: LoopPhase::Aborted,
                    rounds,
                });
            }
            rounds += 1;

            if cancel.is_cancelled() {
                let note = "Interrupted.".to_owned();
                self.record(Turn::assistant(&note));
                return Ok(TurnOutcome {
                    final_text: note,
                    phase: LoopPhase::Aborted,
                    rounds,
                });
            }

            let messages = self.conversation.to_messages(&self.system_prompt);
            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    let note = "Interrupted.".to_owned();
                    self.record(Turn::assistant(&note));
                    return Ok(TurnOutcome {
                        final_text: note,
                        phase: LoopPhase::Aborted,
                        rounds,
                    });
                }
                result = self.client.complete(&messages, &tools) => result,
            };

            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    // Model failures end the turn, never the process.
                    let note = format!("Model call failed: {err}");
                    warn!("{note}");
                    self.record(Turn::assistant(&note));
                    return Ok(TurnOutcome {
                        final_text: note,
                        phase: LoopPhase::Aborted,
                        rounds,
                    });
                }
            };

            if let Some(usage) = &response.usage {
                self.conversation.usage.add(usage);
            }

            let content = response.content.clone().unwrap_or_default();
            if response.tool_calls.is_empty() {
                self.record(Turn::assistant(&content));
                debug!(rounds, "turn completed");
                return Ok(TurnOutcome {
                    final_text: content,
                    phase: LoopPhase::Completed,
                    rounds,
                });
            }

            self.record(Turn::assistant_with_calls(
                &content,
                response.tool_calls.clone(),
            ));

            let (outcomes, cancelled) = self.dispatch(&response.tool_calls, cancel).await;
            for outcome in &outcomes {
                self.record(Turn::tool_result(outcome));
            }
            if cancelled {
                let note = "Interrupted.".to_owned();
                self.record(Turn::assistant(&note));
                return Ok(TurnOutcome {
                    final_text: note,
                    phase: LoopPhase::Aborted,
                    rounds,
                });
            }
        }
    }

    /// Run every tool call of one assistant turn concurrently and collect
    /// the outcomes in call order. On cancellation the outcomes received so
    /// far are kept (work that already ran is not lost), calls still in
    /// flight are answered with an interruption marker, and the detached
    /// tasks log their late results instead of delivering them.
    async fn dispatch(
        &self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> (Vec<ToolOutcome>, bool) {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for (index, call) in calls.iter().cloned().enumerate() {
            let executor = self.executor.clone();
            let tx = tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let outcome = executor.execute(call).await;
                if cancel.is_cancelled() {
                    debug!(tool = %outcome.tool_name, "discarding tool result after cancel");
                    return;
                }
                let _ = tx.send((index, outcome));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<ToolOutcome>> = vec![None; calls.len()];
        let mut cancelled = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                received = rx.recv() => match received {
                    Some((index, outcome)) => slots[index] = Some(outcome),
                    None => break,
                }
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(calls)
            .map(|(slot, call)| {
                slot.unwrap_or_else(|| {
                    if cancelled {
                        interrupted_outcome(call)
                    } else {
                        lost_outcome(call)
                    }
                })
            })
            .collect();
        (outcomes, cancelled)
    }

    /// Append to the in-memory log and persist. Storage failures degrade to
    /// a warning so the conversation keeps going.
    fn record(&mut self, turn: Turn) {
        if let Err(err) = self.store.append(&self.conversation.session_id, &turn) {
            warn!(
                session = %self.conversation.session_id,
                "failed to persist turn: {err:#}"
            );
        }
        self.conversation.push(turn);
    }
}

fn interrupted_outcome(call: &ToolCall) -> ToolOutcome {
    ToolOutcome {
        call_id: call.id.clone(),
        tool_name: call.function.name.clone(),
        status: ToolResultStatus::Error,
        payload: r#"{"error": {"type": "execution_failed", "message": "interrupted by user"}}"#
            .to_owned(),
    }
}

fn lost_outcome(call: &ToolCall) -> ToolOutcome {
    ToolOutcome {
        call_id: call.id.clone(),
        tool_name: call.function.name.clone(),
        status: ToolResultStatus::Error,
        payload: r#"{"error": {"type": "execution_failed", "message": "tool task ended without a result"}}"#
            .to_owned(),
    }
}
