//! Progressive-disclosure interaction state.
//!
//! `Idle → Submitted → ResultShown → VisualizerOpen`. The machine is a pure
//! function of `(state, event)`; it never performs I/O. Side effects are
//! requested through the returned [`Effect`], and the only effect that runs a
//! query is produced by a `Submit` transition.

use std::fmt;
use std::sync::Arc;

use crate::db::TabularResult;
use crate::error::{ExecutionError, LogError, ValidationError};
use crate::query::Query;
use crate::safety::StatementPolicy;

/// Something the user should see while the session is idle.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The submission never reached the engine.
    Validation(ValidationError),
    /// The engine failed; `audit` tells whether the failure was recorded.
    Execution {
        error: ExecutionError,
        audit: Result<(), LogError>,
    },
}

/// The state of one user's interaction cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionState {
    Idle { notice: Option<Notice> },
    Submitted { query: Query },
    ResultShown { query: Query, result: Arc<TabularResult> },
    VisualizerOpen { query: Query, result: Arc<TabularResult> },
}

impl Default for InteractionState {
    fn default() -> Self {
        Self::Idle { notice: None }
    }
}

impl InteractionState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle { .. } => "Idle",
            Self::Submitted { .. } => "Submitted",
            Self::ResultShown { .. } => "ResultShown",
            Self::VisualizerOpen { .. } => "VisualizerOpen",
        }
    }

    /// The current result, if one is shown.
    pub fn result(&self) -> Option<&Arc<TabularResult>> {
        match self {
            Self::ResultShown { result, .. } | Self::VisualizerOpen { result, .. } => Some(result),
            Self::Idle { .. } | Self::Submitted { .. } => None,
        }
    }

    pub fn query(&self) -> Option<&Query> {
        match self {
            Self::Submitted { query }
            | Self::ResultShown { query, .. }
            | Self::VisualizerOpen { query, .. } => Some(query),
            Self::Idle { .. } => None,
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Self::Idle { notice } => notice.as_ref(),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle { .. })
    }
}

impl fmt::Display for InteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum Event {
    /// The user submitted the query box contents.
    Submit(String),
    ExecutionSucceeded(TabularResult),
    /// Execution failed and the audit write has been attempted.
    ExecutionFailed {
        error: ExecutionError,
        audit: Result<(), LogError>,
    },
    OpenVisualizer,
    CloseVisualizer,
}

/// Why a visualize request was not honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// There is no result to explore yet.
    NoResult,
    /// A query is still running.
    ExecutionPending,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResult => write!(f, "Run a query before opening the explorer"),
            Self::ExecutionPending => write!(f, "Wait for the query to finish"),
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    /// Run the query on the data profile.
    Execute(Query),
    /// The submission was invalid; nothing runs.
    Rejected(ValidationError),
    /// Hand the result to the table renderer.
    ShowResult(Arc<TabularResult>),
    /// Build the explorer payload from the already-held result.
    OpenExplorer(Arc<TabularResult>),
    Refused(Refusal),
}

/// Output of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: InteractionState,
    pub effect: Effect,
}

impl Transition {
    fn new(state: InteractionState, effect: Effect) -> Self {
        Self { state, effect }
    }

    fn unchanged(state: InteractionState) -> Self {
        Self::new(state, Effect::None)
    }
}

/// The transition function, parameterized by the statement policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStateMachine {
    policy: StatementPolicy,
}

impl SessionStateMachine {
    pub fn new(policy: StatementPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> StatementPolicy {
        self.policy
    }

    fn validate(&self, text: String) -> Result<Query, ValidationError> {
        let query = Query::new(text)?;
        self.policy.check(&query)?;
        Ok(query)
    }

    pub fn step(&self, state: InteractionState, event: Event) -> Transition {
        use InteractionState as S;

        match (state, event) {
            // A new submission discards whatever the previous cycle held.
            (_, Event::Submit(text)) => match self.validate(text) {
                Ok(query) => Transition::new(S::Submitted { query: query.clone() }, Effect::Execute(query)),
                Err(e) => Transition::new(
                    S::Idle {
                        notice: Some(Notice::Validation(e.clone())),
                    },
                    Effect::Rejected(e),
                ),
            },

            (S::Submitted { query }, Event::ExecutionSucceeded(result)) => {
                let result = Arc::new(result);
                Transition::new(
                    S::ResultShown {
                        query,
                        result: Arc::clone(&result),
                    },
                    Effect::ShowResult(result),
                )
            }

            (S::Submitted { .. }, Event::ExecutionFailed { error, audit }) => Transition::unchanged(S::Idle {
                notice: Some(Notice::Execution { error, audit }),
            }),

            (S::ResultShown { query, result }, Event::OpenVisualizer) => Transition::new(
                S::VisualizerOpen {
                    query,
                    result: Arc::clone(&result),
                },
                Effect::OpenExplorer(result),
            ),

            (S::VisualizerOpen { query, result }, Event::CloseVisualizer) => {
                Transition::unchanged(S::ResultShown { query, result })
            }

            (state @ S::Idle { .. }, Event::OpenVisualizer) => {
                Transition::new(state, Effect::Refused(Refusal::NoResult))
            }
            (state @ S::Submitted { .. }, Event::OpenVisualizer) => {
                Transition::new(state, Effect::Refused(Refusal::ExecutionPending))
            }

            // Already open, closing something not open, or a stray outcome.
            (state, _) => Transition::unchanged(state),
        }
    }
}
