//! Stage vocabulary for the agent loop.
//!
//! ```text
//! planning ──▶ reasoning ──▶ toolUsed ──▶ summary ──▶ done
//!                  ▲             │
//!                  └─────────────┘
//! ```
//!
//! The model names the next stage itself; the engine only validates the
//! name against this closed set and applies [`resolve_transition`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// One phase of the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Planning,
    Reasoning,
    ToolUsed,
    Summary,
    Done,
}

impl Stage {
    /// All protocol stages, in nominal order.
    pub const ALL: [Stage; 5] = [
        Stage::Planning,
        Stage::Reasoning,
        Stage::ToolUsed,
        Stage::Summary,
        Stage::Done,
    ];

    /// Wire name (`toolUsed`, not `tool_used`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Reasoning => "reasoning",
            Stage::ToolUsed => "toolUsed",
            Stage::Summary => "summary",
            Stage::Done => "done",
        }
    }

    /// Parse a stage name written by a model.
    ///
    /// Case, `_`, `-` and spaces are ignored, so `toolUsed`, `tool_used`,
    /// `Tool-Used` and `TOOLUSED` all map to [`Stage::ToolUsed`].
    pub fn parse_lenient(raw: &str) -> Option<Stage> {
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().to_ascii_lowercase() == normalized)
    }

    /// Next stage when the model omits `nextStage` or writes garbage.
    pub fn default_next(&self) -> Stage {
        match self {
            Stage::Planning => Stage::Reasoning,
            Stage::Reasoning => Stage::ToolUsed,
            Stage::ToolUsed => Stage::Reasoning,
            Stage::Summary => Stage::Done,
            Stage::Done => Stage::Done,
        }
    }

    /// Output token budget for a turn in this stage.
    pub fn token_budget(&self) -> u32 {
        match self {
            Stage::Planning => 1024,
            Stage::Reasoning => 2048,
            Stage::ToolUsed => 1024,
            Stage::Summary => 8192,
            Stage::Done => 2048,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply the one transition the engine overrides: `done` is only reachable
/// from `summary`, so a premature `done` is redirected to `summary`.
pub fn resolve_transition(current: Stage, proposed: Stage) -> Stage {
    if proposed == Stage::Done && current != Stage::Summary {
        Stage::Summary
    } else {
        proposed
    }
}
