//! Report lifecycle state machine.
//!
//! ```text
//!   Active ──resolve──▶ Resolved ──delete──▶ Deleted
//!     ▲                    │
//!     └───────undo─────────┘
//! ```
//!
//! There is no direct Active → Deleted edge. Deleted is terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IncidentError, Result};

/// Where a report currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportState {
    Active,
    Resolved,
    Deleted,
}

/// A requested state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Resolve,
    Undo,
    Delete,
}

impl Transition {
    /// State a report must be in for this transition.
    pub fn from_state(self) -> ReportState {
        match self {
            Transition::Resolve => ReportState::Active,
            Transition::Undo | Transition::Delete => ReportState::Resolved,
        }
    }

    /// State the report ends up in.
    pub fn to_state(self) -> ReportState {
        match self {
            Transition::Resolve => ReportState::Resolved,
            Transition::Undo => ReportState::Active,
            Transition::Delete => ReportState::Deleted,
        }
    }

    /// Confirmation prompt shown before the request is sent.
    pub fn confirmation(self) -> &'static str {
        match self {
            Transition::Resolve => "Mover esta ocorrência para o arquivo de resolvidos?",
            Transition::Undo => "Restaurar esta ocorrência para a lista principal?",
            Transition::Delete => "ATENÇÃO: Ação irreversível! Excluir permanentemente?",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::Resolve => "resolve",
            Transition::Undo => "undo",
            Transition::Delete => "delete",
        };
        f.write_str(name)
    }
}

impl ReportState {
    /// Apply a transition, rejecting edges the state machine does not have.
    pub fn apply(self, transition: Transition) -> Result<ReportState> {
        if self == transition.from_state() {
            Ok(transition.to_state())
        } else {
            Err(IncidentError::validation(format!(
                "cannot {} a report that is {:?}",
                transition, self
            )))
        }
    }
}
