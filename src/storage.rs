use serde::{Deserialize, Serialize};

/// A parameter accepted by a catalog command.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// A catalog command. Owned by the catalog; the dispatch path only reads it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub dangerous: bool,
    #[serde(default)]
    pub requires_confirmation: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The endpoint answered with a non-2xx status.
    HttpStatus(u16),
    /// The request never completed a round trip.
    Transport(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::HttpStatus(status) => write!(f, "HTTP {}", status),
            FailureReason::Transport(message) => f.write_str(message),
        }
    }
}

/// Terminal state of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    Failure(FailureReason),
}

impl DispatchOutcome {
    /// Any 2xx is success; a transport error message becomes a failure.
    pub fn classify(response: Result<u16, String>) -> Self {
        match response {
            Ok(status) if (200..300).contains(&status) => DispatchOutcome::Success,
            Ok(status) => DispatchOutcome::Failure(FailureReason::HttpStatus(status)),
            Err(message) => DispatchOutcome::Failure(FailureReason::Transport(message)),
        }
    }
}

/// One persisted dispatch record. Serialized field names match the stored blob.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub command_id: String,     // Snapshot of the command id at dispatch time
    pub command_name: String,   // Snapshot of the display name at dispatch time
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>, // Set iff status == Success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,  // Set iff status == Error
    pub start_time: i64,        // Epoch milliseconds
    pub end_time: i64,          // Epoch milliseconds
    pub duration: i64,          // end_time - start_time
    pub timestamp: i64,         // Same as start_time
}

impl HistoryEntry {
    pub fn entry_id(command_id: &str, start_time: i64) -> String {
        format!("{}-{}", command_id, start_time)
    }

    /// Builds the record for a finished attempt.
    ///
    /// Transport failures never completed a timed round trip, so their entry is
    /// zero-width: `end_time` is pinned to `start_time` and `duration` is 0.
    pub fn from_outcome(
        command: &Command,
        outcome: &DispatchOutcome,
        success_note: &str,
        start_time: i64,
        end_time: i64,
    ) -> Self {
        let (status, output, error) = match outcome {
            DispatchOutcome::Success => (EntryStatus::Success, Some(success_note.to_string()), None),
            DispatchOutcome::Failure(reason) => (EntryStatus::Error, None, Some(reason.to_string())),
        };
        let end_time = match outcome {
            DispatchOutcome::Failure(FailureReason::Transport(_)) => start_time,
            _ => end_time.max(start_time),
        };

        Self {
            id: Self::entry_id(&command.id, start_time),
            command_id: command.id.clone(),
            command_name: command.name.clone(),
            status,
            output,
            error,
            start_time,
            end_time,
            duration: end_time - start_time,
            timestamp: start_time,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EntryStatus::Success
    }
}
