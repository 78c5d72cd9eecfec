// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use hagent_config::AgentConfig;
use hagent_model::{Message, ModelError, StreamingChatClient};
use hagent_tools::{ToolOutput, ToolRegistry};

use crate::{
    conversation::Conversation,
    directive::{parse_directive, Directive},
    events::AgentEvent,
    prompts::{malformed_directive_feedback, system_prompt, unknown_tool_feedback},
};

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// The model gave a final answer.
    Finished,
    /// The planning budget ran out before a final answer.
    MaxRoundsExceeded,
    /// A planning call failed; the outcome carries whatever text arrived.
    ModelError(ModelError),
    Cancelled,
}

/// Position of a run in the plan → act → observe cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Planning,
    Acting { tool: String, input: String },
    Observing { tool: String, output: ToolOutput },
    Done(StopReason),
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final answer, or the best text available when the run stopped early.
    pub answer: String,
    pub stop: StopReason,
    /// Planning calls made.
    pub rounds: u32,
    pub conversation: Conversation,
}

impl AgentOutcome {
    pub fn is_finished(&self) -> bool {
        self.stop == StopReason::Finished
    }

    pub fn max_rounds_exceeded(&self) -> bool {
        self.stop == StopReason::MaxRoundsExceeded
    }
}

/// State of one in-flight request.  Each run owns its conversation.
#[derive(Debug)]
pub struct AgentRun {
    id: Uuid,
    conversation: Conversation,
    state: LoopState,
    rounds: u32,
    answer: String,
}

impl AgentRun {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, LoopState::Done(_))
    }

    /// Consume the run.  A run that never reached `Done` is reported as
    /// cancelled.
    pub fn into_outcome(self) -> AgentOutcome {
        let stop = match self.state {
            LoopState::Done(reason) => reason,
            _ => StopReason::Cancelled,
        };
        AgentOutcome {
            answer: self.answer,
            stop,
            rounds: self.rounds,
            conversation: self.conversation,
        }
    }

    fn last_assistant_text(&self) -> String {
        self.conversation
            .last_assistant()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

/// The ReAct loop driver.
///
/// Holds only shared, read-only state, so one `Agent` can serve any number of
/// concurrent runs.
pub struct Agent {
    client: Arc<StreamingChatClient>,
    tools: Arc<ToolRegistry>,
    config: Arc<AgentConfig>,
}

impl Agent {
    pub fn new(
        client: Arc<StreamingChatClient>,
        tools: Arc<ToolRegistry>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self { client, tools, config }
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn config(&self) -> &Arc<AgentConfig> {
        &self.config
    }

    /// Begin a run for `question` in the `Planning` state.
    pub fn start(&self, question: &str) -> AgentRun {
        AgentRun {
            id: Uuid::new_v4(),
            conversation: Conversation::with_prompt(system_prompt(&self.tools), question),
            state: LoopState::Planning,
            rounds: 0,
            answer: String::new(),
        }
    }

    /// Perform exactly one state transition.  Does nothing once the run is done.
    pub async fn step(&self, run: &mut AgentRun, tx: &mpsc::Sender<AgentEvent>) {
        self.advance(run, tx, &mut None).await;
    }

    /// Drive a run for `question` to completion, streaming events through `tx`.
    pub async fn run(&self, question: &str, tx: mpsc::Sender<AgentEvent>) -> AgentOutcome {
        self.drive(self.start(question), tx, None).await
    }

    /// Like [`Agent::run`] but stops when `cancel` fires.
    ///
    /// Both `send(())` and dropping the sender count as cancellation.  Text
    /// streamed in the interrupted round is reported in the outcome's
    /// `answer` and never appended to the conversation.
    pub async fn run_with_cancel(
        &self,
        question: &str,
        tx: mpsc::Sender<AgentEvent>,
        cancel: oneshot::Receiver<()>,
    ) -> AgentOutcome {
        self.drive(self.start(question), tx, Some(cancel)).await
    }

    async fn drive(
        &self,
        mut run: AgentRun,
        tx: mpsc::Sender<AgentEvent>,
        mut cancel: Option<oneshot::Receiver<()>>,
    ) -> AgentOutcome {
        let span = info_span!("agent_run", run_id = %run.id);
        async {
            while !run.is_done() {
                self.advance(&mut run, &tx, &mut cancel).await;
            }
            let outcome = run.into_outcome();
            info!(stop = ?outcome.stop, rounds = outcome.rounds, "run finished");
            outcome
        }
        .instrument(span)
        .await
    }

    async fn advance(
        &self,
        run: &mut AgentRun,
        tx: &mpsc::Sender<AgentEvent>,
        cancel: &mut Option<oneshot::Receiver<()>>,
    ) {
        if run.is_done() {
            return;
        }
        if cancel_requested(cancel) {
            let partial = run.last_assistant_text();
            self.cancel(run, tx, partial).await;
            return;
        }

        match std::mem::replace(&mut run.state, LoopState::Planning) {
            LoopState::Planning => self.plan(run, tx, cancel).await,
            LoopState::Acting { tool, input } => self.act(run, tx, cancel, tool, input).await,
            LoopState::Observing { tool, output } => {
                debug!(tool = %tool, is_error = output.is_error, "observation");
                let _ = tx
                    .send(AgentEvent::ToolCallFinished {
                        tool,
                        output: output.content.clone(),
                        is_error: output.is_error,
                    })
                    .await;
                run.conversation.push(Message::tool(output.content));
                run.state = LoopState::Planning;
            }
            LoopState::Done(reason) => run.state = LoopState::Done(reason),
        }
    }

    async fn plan(
        &self,
        run: &mut AgentRun,
        tx: &mpsc::Sender<AgentEvent>,
        cancel: &mut Option<oneshot::Receiver<()>>,
    ) {
        if run.rounds >= self.config.max_rounds {
            warn!(max_rounds = self.config.max_rounds, "round budget exhausted");
            run.answer = run.last_assistant_text();
            self.finish(run, tx, StopReason::MaxRoundsExceeded).await;
            return;
        }
        run.rounds += 1;
        info!(round = run.rounds, turns = run.conversation.len(), "planning");

        let open = self.client.open(run.conversation.turns(), self.config.temperature);
        let opened = match cancel.as_mut() {
            Some(rx) => tokio::select! {
                biased;
                _ = rx => None,
                s = open => Some(s),
            },
            None => Some(open.await),
        };
        let mut stream = match opened {
            None => return self.cancel(run, tx, String::new()).await,
            Some(Ok(stream)) => stream,
            Some(Err(e)) => return self.model_failed(run, tx, e, String::new()).await,
        };

        loop {
            let next = match cancel.as_mut() {
                Some(rx) => tokio::select! {
                    biased;
                    _ = rx => {
                        let partial = stream.text().to_string();
                        return self.cancel(run, tx, partial).await;
                    }
                    chunk = stream.next_chunk() => chunk,
                },
                None => stream.next_chunk().await,
            };
            match next {
                Some(chunk) => {
                    let _ = tx.send(AgentEvent::TextDelta(chunk.delta)).await;
                }
                None => break,
            }
        }

        let result = stream.finish();
        if let Some(e) = result.error {
            return self.model_failed(run, tx, e, result.text).await;
        }

        let reply = result.text;
        let _ = tx.send(AgentEvent::TextComplete(reply.clone())).await;
        let directive = parse_directive(&reply);
        run.conversation.push(Message::assistant(reply));

        match directive {
            Directive::Finish(answer) | Directive::Answer(answer) => {
                run.answer = answer;
                self.finish(run, tx, StopReason::Finished).await;
            }
            Directive::Act { tool, input } => {
                debug!(tool = %tool, "action directive");
                run.state = LoopState::Acting { tool, input };
            }
            Directive::Malformed(line) => {
                warn!(line = %line, "malformed action directive");
                run.conversation.push(Message::tool(malformed_directive_feedback(&line)));
                run.state = LoopState::Planning;
            }
        }
    }

    async fn act(
        &self,
        run: &mut AgentRun,
        tx: &mpsc::Sender<AgentEvent>,
        cancel: &mut Option<oneshot::Receiver<()>>,
        tool: String,
        input: String,
    ) {
        if self.tools.lookup(&tool).is_none() {
            warn!(tool = %tool, "unknown tool requested");
            let _ = tx.send(AgentEvent::ToolNotFound { tool: tool.clone() }).await;
            run.conversation.push(Message::tool(unknown_tool_feedback(&tool, &self.tools)));
            run.state = LoopState::Planning;
            return;
        }

        info!(tool = %tool, "invoking tool");
        let _ = tx
            .send(AgentEvent::ToolCallStarted { tool: tool.clone(), input: input.clone() })
            .await;

        let invoke = self.tools.invoke(&tool, &input, self.config.tool_timeout());
        let output = match cancel.as_mut() {
            Some(rx) => tokio::select! {
                biased;
                _ = rx => None,
                out = invoke => Some(out),
            },
            None => Some(invoke.await),
        };
        let output = match output {
            None => {
                let partial = run.last_assistant_text();
                return self.cancel(run, tx, partial).await;
            }
            Some(Some(output)) => output,
            Some(None) => ToolOutput::err(unknown_tool_feedback(&tool, &self.tools)),
        };
        run.state = LoopState::Observing { tool, output };
    }

    async fn model_failed(
        &self,
        run: &mut AgentRun,
        tx: &mpsc::Sender<AgentEvent>,
        err: ModelError,
        partial: String,
    ) {
        warn!(error = %err, partial_len = partial.len(), "planning call failed");
        let _ = tx.send(AgentEvent::Error(err.to_string())).await;
        run.answer = partial;
        self.finish(run, tx, StopReason::ModelError(err)).await;
    }

    async fn cancel(&self, run: &mut AgentRun, tx: &mpsc::Sender<AgentEvent>, partial: String) {
        info!(partial_len = partial.len(), "run cancelled");
        let _ = tx.send(AgentEvent::Aborted { partial_text: partial.clone() }).await;
        run.answer = partial;
        self.finish(run, tx, StopReason::Cancelled).await;
    }

    async fn finish(&self, run: &mut AgentRun, tx: &mpsc::Sender<AgentEvent>, reason: StopReason) {
        run.state = LoopState::Done(reason);
        let _ = tx.send(AgentEvent::TurnComplete).await;
    }
}

/// `true` once the sender fired or went away.
fn cancel_requested(cancel: &mut Option<oneshot::Receiver<()>>) -> bool {
    match cancel {
        Some(rx) => !matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)),
        None => false,
    }
}
