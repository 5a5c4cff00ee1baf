//! Deep research: a bounded multi-iteration conversation protocol
//!
//! A research run drives the RAG engine through at most five iterations,
//! assembling a stage-specific prompt each time and watching the generated
//! text for completion markers. Consumers always see a closed trajectory:
//! if the limit is hit without a detected conclusion, one is appended.

use crate::analyzer::ProjectAnalysis;
use crate::conversation::{ConversationStore, MessageRole};
use crate::error::Result;
use crate::rag::{QueryAnswer, QueryOptions, RagEngine};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// User turn issued automatically between iterations
pub const CONTINUE_RESEARCH_PROMPT: &str = "[DEEP RESEARCH] Continue the research";

/// Hard iteration bound
pub const MAX_RESEARCH_ITERATIONS: u8 = 5;

/// Prior conversation turns included in intermediate prompts
const PRIOR_TURNS_WINDOW: usize = 10;

/// Pause between iterations
const ITERATION_PAUSE_MS: u64 = 1000;

/// Phrases that indicate the model intends to continue
const CONTINUATION_MARKERS: &[&str] = &["I will now proceed to", "Next Steps", "next iteration"];

/// Phrases that close a research trajectory on their own
const COMPLETION_MARKERS: &[&str] = &[
    "This concludes our research",
    "This completes our investigation",
    "This concludes the deep research process",
    "Key Findings and Implementation Details",
    "In conclusion,",
];

/// Stage of a deep-research conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchStage {
    First,
    Intermediate,
    Final,
    Done,
}

/// State carried between research iterations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepResearchState {
    pub stage: ResearchStage,
    /// 1-based iteration index, 1..=5
    pub iteration: u8,
    pub research_complete: bool,
}

impl DeepResearchState {
    /// State before the first generation
    pub fn new() -> Self {
        Self {
            stage: ResearchStage::First,
            iteration: 1,
            research_complete: false,
        }
    }

    /// Apply the transition rules to a generated answer.
    ///
    /// At the iteration limit without a detected conclusion, a synthetic
    /// `## Final Conclusion` paragraph is appended to the answer.
    pub fn observe(&mut self, answer: &mut String) {
        if detects_completion(answer) {
            debug!("Completion detected at iteration {}", self.iteration);
            self.stage = ResearchStage::Done;
            self.research_complete = true;
            return;
        }

        match self.stage {
            ResearchStage::First => {
                self.stage = ResearchStage::Intermediate;
                self.iteration = 2;
            }
            ResearchStage::Intermediate if self.iteration < 4 => {
                self.iteration += 1;
            }
            ResearchStage::Intermediate => {
                self.stage = ResearchStage::Final;
                self.iteration = MAX_RESEARCH_ITERATIONS;
            }
            ResearchStage::Final => {
                info!("Iteration limit reached, forcing a final conclusion");
                answer.push_str(
                    "\n\n## Final Conclusion\n\nThe iteration limit was reached; \
                     the findings above stand as the final state of this investigation.",
                );
                self.stage = ResearchStage::Done;
                self.research_complete = true;
            }
            ResearchStage::Done => {}
        }
    }
}

impl Default for DeepResearchState {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a generated text closes the research trajectory
pub fn detects_completion(text: &str) -> bool {
    if text.contains("## Final Conclusion") {
        return true;
    }

    if (text.contains("## Conclusion") || text.contains("## Summary"))
        && !CONTINUATION_MARKERS.iter().any(|marker| text.contains(marker))
    {
        return true;
    }

    if COMPLETION_MARKERS.iter().any(|marker| text.contains(marker)) {
        return true;
    }

    text.contains("Final") && text.contains("Conclusion")
}

/// The repository facts presented on the first iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryFingerprint {
    pub name: String,
    pub project_type: String,
    pub primary_language: Option<String>,
    pub main_directories: Vec<String>,
}

impl From<&ProjectAnalysis> for RepositoryFingerprint {
    fn from(analysis: &ProjectAnalysis) -> Self {
        Self {
            name: analysis.project_name.clone(),
            project_type: analysis.project_type.clone(),
            primary_language: analysis.primary_language().map(str::to_string),
            main_directories: analysis.main_directories.clone(),
        }
    }
}

/// One completed iteration
#[derive(Debug)]
pub struct ResearchIteration {
    pub iteration: u8,
    pub stage: ResearchStage,
    pub answer: QueryAnswer,
}

/// Outcome of a full research run
#[derive(Debug)]
pub struct ResearchOutcome {
    pub iterations: Vec<ResearchIteration>,
    pub state: DeepResearchState,
}

impl ResearchOutcome {
    /// Text of the last iteration
    pub fn final_answer(&self) -> &str {
        self.iterations
            .last()
            .map(|iteration| iteration.answer.answer.as_str())
            .unwrap_or_default()
    }
}

/// Drives a deep-research conversation against one engine
pub struct DeepResearch<'a> {
    engine: &'a RagEngine,
    conversation: &'a mut ConversationStore,
    fingerprint: RepositoryFingerprint,
}

impl<'a> DeepResearch<'a> {
    pub fn new(
        engine: &'a RagEngine,
        conversation: &'a mut ConversationStore,
        fingerprint: RepositoryFingerprint,
    ) -> Self {
        Self {
            engine,
            conversation,
            fingerprint,
        }
    }

    /// Run the research loop for a question.
    ///
    /// Terminates in at most [`MAX_RESEARCH_ITERATIONS`] generations.
    pub async fn run(&mut self, question: &str) -> Result<ResearchOutcome> {
        let mut state = DeepResearchState::new();
        let mut iterations = Vec::new();

        self.conversation
            .add_message(MessageRole::User, question, None);

        loop {
            let stage = state.stage;
            let prompt = self.assemble_prompt(&state, question);
            let options = QueryOptions {
                context: self.prior_turns_digest(),
                ..QueryOptions::default()
            };

            let mut answer = self.engine.query(&prompt, &options).await?;

            state.observe(&mut answer.answer);

            let sources: Vec<String> = answer
                .sources
                .iter()
                .map(|scored| scored.document.path.clone())
                .collect();
            self.conversation.add_message(
                MessageRole::Assistant,
                answer.answer.clone(),
                (!sources.is_empty()).then_some(sources),
            );

            let generated_at = iterations.len() as u8 + 1;
            iterations.push(ResearchIteration {
                iteration: generated_at,
                stage,
                answer,
            });

            if state.stage == ResearchStage::Done {
                break;
            }

            tokio::time::sleep(std::time::Duration::from_millis(ITERATION_PAUSE_MS)).await;
            self.conversation
                .add_message(MessageRole::User, CONTINUE_RESEARCH_PROMPT, None);
        }

        info!(
            "Research finished after {} iterations (complete: {})",
            iterations.len(),
            state.research_complete
        );

        Ok(ResearchOutcome { iterations, state })
    }

    fn assemble_prompt(&self, state: &DeepResearchState, question: &str) -> String {
        match state.stage {
            ResearchStage::First => {
                let fingerprint = &self.fingerprint;
                format!(
                    "Repository: {} ({}{})\nMain directories: {}\n\nResearch question: {}\n\n\
                     Begin with a '## Research Plan' section outlining how you will \
                     investigate, then report your first-pass findings.",
                    fingerprint.name,
                    fingerprint.project_type,
                    fingerprint
                        .primary_language
                        .as_deref()
                        .map(|language| format!(", primarily {}", language))
                        .unwrap_or_default(),
                    fingerprint.main_directories.join(", "),
                    question
                )
            }
            ResearchStage::Intermediate => format!(
                "Research question: {}\n\n{}\n\nContinue the investigation using the \
                 retrieved code. Structure the answer as '## Research Update {}'.",
                question, CONTINUE_RESEARCH_PROMPT, state.iteration
            ),
            ResearchStage::Final | ResearchStage::Done => format!(
                "Research question: {}\n\n{}\n\nThis is the last iteration. Produce a \
                 '## Final Conclusion' that synthesizes the findings of all iterations.",
                question, CONTINUE_RESEARCH_PROMPT
            ),
        }
    }

    /// Bounded digest of prior turns, used as additional query context
    fn prior_turns_digest(&self) -> Option<String> {
        let recent = self.conversation.recent_messages(PRIOR_TURNS_WINDOW);
        if recent.is_empty() {
            return None;
        }
        let digest = recent
            .iter()
            .map(|message| {
                let role = match message.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                    MessageRole::System => "system",
                };
                format!("{}: {}", role, message.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        Some(digest)
    }
}
