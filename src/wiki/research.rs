//! Deep research: a multi-turn question loop over the chat transport.
//!
//! The first turn carries the question tagged `[DEEP RESEARCH]`. Each reply
//! is classified into a stage; until a reply reads as concluded, the reply is
//! appended to the history with a "continue" turn and the model is asked
//! again. The fifth turn is the last one either way.

use tracing::{debug, info, instrument, warn};

use crate::config::GenerationConfig;
use crate::constants::research::{MAX_ITERATIONS, TAG};
use crate::extract::{FORCED_CONCLUSION, ResearchStage, is_research_complete};
use crate::transport::{ChatMessage, ChatRequest, SharedTransport, collect_stream};
use crate::types::{Language, RepositorySpec, Result};

const CONTINUE_PROMPT: &str = "Continue the research";
const CONTINUE_FAILED: &str = "\n\nError: Failed to continue research. Please try again.";

/// How the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchOutcome {
    /// A reply read as a conclusion
    Concluded,
    /// The iteration cap was reached and the conclusion note appended
    Forced,
    /// A continuation call failed
    Interrupted,
    /// Single-turn question
    Answered,
}

#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub question: String,
    pub stages: Vec<ResearchStage>,
    /// Reply text of every turn, in order
    pub responses: Vec<String>,
    pub final_response: String,
    pub iterations: usize,
    pub outcome: ResearchOutcome,
}

/// Progress callbacks while research runs
#[derive(Debug, Clone, Copy)]
pub enum ResearchProgress<'a> {
    Iteration(usize),
    Chunk(&'a str),
    Stage(&'a ResearchStage),
}

pub struct Researcher {
    transport: SharedTransport,
    generation: GenerationConfig,
}

impl Researcher {
    pub fn new(transport: SharedTransport, generation: GenerationConfig) -> Self {
        Self {
            transport,
            generation,
        }
    }

    fn request(&self, repo: &RepositorySpec, language: &Language, history: &[ChatMessage]) -> ChatRequest {
        ChatRequest::with_messages(repo, history.to_vec()).with_generation(&self.generation, language)
    }

    /// Ask once, without the research loop
    pub async fn ask<F>(
        &self,
        repo: &RepositorySpec,
        language: &Language,
        question: &str,
        mut on_progress: F,
    ) -> Result<ResearchReport>
    where
        F: FnMut(ResearchProgress<'_>),
    {
        let history = vec![ChatMessage::user(question)];
        let stream = self.transport.send(&self.request(repo, language, &history)).await?;
        let text = collect_stream(stream, |chunk| on_progress(ResearchProgress::Chunk(chunk)))
            .await
            .into_result()?;

        Ok(ResearchReport {
            question: question.to_string(),
            stages: Vec::new(),
            responses: vec![text.clone()],
            final_response: text,
            iterations: 1,
            outcome: ResearchOutcome::Answered,
        })
    }

    /// Run the research loop until a conclusion or the iteration cap.
    ///
    /// A failure on the first turn is returned as an error; a failure on a
    /// later turn ends the loop with an error note on the last reply.
    #[instrument(skip_all, fields(repo = %repo.key()))]
    pub async fn research<F>(
        &self,
        repo: &RepositorySpec,
        language: &Language,
        question: &str,
        mut on_progress: F,
    ) -> Result<ResearchReport>
    where
        F: FnMut(ResearchProgress<'_>),
    {
        let mut history = vec![ChatMessage::user(format!("{}{}", TAG, question))];
        let mut stages: Vec<ResearchStage> = Vec::new();
        let mut responses: Vec<String> = Vec::new();
        let mut iteration = 1;

        on_progress(ResearchProgress::Iteration(iteration));
        let stream = self.transport.send(&self.request(repo, language, &history)).await?;
        let mut response = collect_stream(stream, |chunk| on_progress(ResearchProgress::Chunk(chunk)))
            .await
            .into_result()?;

        let outcome = loop {
            if let Some(stage) = ResearchStage::detect(&response, iteration) {
                debug!("Iteration {}: {}", iteration, stage.title);
                upsert_stage(&mut stages, stage);
                if let Some(stage) = stages.last() {
                    on_progress(ResearchProgress::Stage(stage));
                }
            }

            if is_research_complete(&response) {
                break ResearchOutcome::Concluded;
            }
            if iteration >= MAX_ITERATIONS {
                info!("Reached {} iterations without a conclusion", MAX_ITERATIONS);
                response.push_str(FORCED_CONCLUSION);
                break ResearchOutcome::Forced;
            }

            history.push(ChatMessage::assistant(response.clone()));
            history.push(ChatMessage::user(format!("{}{}", TAG, CONTINUE_PROMPT)));
            responses.push(std::mem::take(&mut response));
            iteration += 1;
            on_progress(ResearchProgress::Iteration(iteration));

            let request = self.request(repo, language, &history);
            match self.transport.send(&request).await {
                Ok(stream) => {
                    let output = collect_stream(stream, |chunk| {
                        on_progress(ResearchProgress::Chunk(chunk))
                    })
                    .await;
                    response = output.text;
                    if let Some(err) = output.error {
                        warn!("Research iteration {} broke off: {}", iteration, err);
                        response.push_str(CONTINUE_FAILED);
                        break ResearchOutcome::Interrupted;
                    }
                }
                Err(err) => {
                    warn!("Research iteration {} failed: {}", iteration, err);
                    // Nothing new arrived; the note goes on the previous reply
                    iteration -= 1;
                    response = responses.pop().unwrap_or_default();
                    response.push_str(CONTINUE_FAILED);
                    break ResearchOutcome::Interrupted;
                }
            }
        };

        responses.push(response.clone());
        info!("Research finished after {} iterations ({:?})", iteration, outcome);

        Ok(ResearchReport {
            question: question.to_string(),
            stages,
            responses,
            final_response: response,
            iterations: iteration,
            outcome,
        })
    }
}

/// Replace a stage of the same iteration and kind, else append
fn upsert_stage(stages: &mut Vec<ResearchStage>, stage: ResearchStage) {
    match stages
        .iter()
        .position(|s| s.iteration == stage.iteration && s.kind == stage.kind)
    {
        Some(index) => {
            stages.remove(index);
            stages.push(stage);
        }
        None => stages.push(stage),
    }
}
