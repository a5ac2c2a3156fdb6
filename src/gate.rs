use tracing::info;

use crate::dispatcher::{DispatchError, Dispatcher, TransportConfig};
use crate::storage::{Command, HistoryEntry};

/// Answer to a yes/no prompt. Anything but an explicit yes is `Cancel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confirmation {
    Confirm,
    #[default]
    Cancel,
}

/// Asks the operator to approve a command before it is dispatched.
pub trait Confirmer {
    fn confirm(&self, command: &Command) -> Confirmation;
}

/// Approves everything without asking.
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _command: &Command) -> Confirmation {
        Confirmation::Confirm
    }
}

pub fn requires_confirmation(command: &Command) -> bool {
    command.dangerous || command.requires_confirmation
}

#[derive(Debug)]
pub enum Selection {
    /// Operator declined; nothing was sent or recorded.
    Cancelled,
    Dispatched(HistoryEntry),
}

/// Runs the confirmation gate and, if it passes, one dispatch.
pub fn select_command(
    command: &Command,
    confirmer: &dyn Confirmer,
    dispatcher: &Dispatcher<'_>,
    config: &TransportConfig,
) -> Result<Selection, DispatchError> {
    if requires_confirmation(command) && confirmer.confirm(command) != Confirmation::Confirm {
        info!(command = %command.id, "dispatch cancelled at confirmation");
        return Ok(Selection::Cancelled);
    }

    dispatcher.dispatch(command, config).map(Selection::Dispatched)
}
