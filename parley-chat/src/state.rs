//! Run phases and the events that move a run between them.

use parley_assistant::types::RunStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// The user message is on the thread; no run exists yet.
    Submitted,
    Polling,
    /// The service is waiting on tool outputs.
    AwaitingToolOutput,
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    RunCreated,
    Status(RunStatus),
    ToolOutputsSubmitted,
    DeadlineElapsed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed | RunPhase::TimedOut)
    }

    /// Next phase after `event`. Terminal phases absorb every event.
    pub fn on(self, event: RunEvent) -> RunPhase {
        use RunEvent::*;
        use RunPhase::*;

        match (self, event) {
            (Completed | Failed | TimedOut, _) => self,
            (_, DeadlineElapsed) => TimedOut,

            (Submitted, RunCreated) => Polling,
            (Submitted, _) => self,

            (Polling, Status(status)) => match status {
                RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling => Polling,
                RunStatus::RequiresAction => AwaitingToolOutput,
                RunStatus::Completed => Completed,
                RunStatus::Cancelled
                | RunStatus::Failed
                | RunStatus::Incomplete
                | RunStatus::Expired
                | RunStatus::Unknown => Failed,
            },
            (Polling, _) => self,

            (AwaitingToolOutput, ToolOutputsSubmitted) => Polling,
            (AwaitingToolOutput, _) => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replay(events: &[RunEvent]) -> RunPhase {
        events
            .iter()
            .fold(RunPhase::Submitted, |phase, event| phase.on(*event))
    }

    #[test]
    fn tool_round_trip_then_completion() {
        let phase = replay(&[
            RunEvent::RunCreated,
            RunEvent::Status(RunStatus::Queued),
            RunEvent::Status(RunStatus::InProgress),
            RunEvent::Status(RunStatus::RequiresAction),
        ]);
        assert_eq!(phase, RunPhase::AwaitingToolOutput);

        let phase = phase
            .on(RunEvent::ToolOutputsSubmitted)
            .on(RunEvent::Status(RunStatus::Completed));
        assert_eq!(phase, RunPhase::Completed);
    }

    #[test]
    fn failure_statuses_fail_the_run() {
        for status in [
            RunStatus::Failed,
            RunStatus::Cancelled,
            RunStatus::Expired,
            RunStatus::Incomplete,
            RunStatus::Unknown,
        ] {
            let phase = RunPhase::Polling.on(RunEvent::Status(status));
            assert_eq!(phase, RunPhase::Failed, "{status}");
        }
    }

    #[test]
    fn deadline_times_out_any_live_phase() {
        for phase in [
            RunPhase::Submitted,
            RunPhase::Polling,
            RunPhase::AwaitingToolOutput,
        ] {
            assert_eq!(phase.on(RunEvent::DeadlineElapsed), RunPhase::TimedOut);
        }
    }

    #[test]
    fn terminal_phases_absorb_events() {
        for phase in [RunPhase::Completed, RunPhase::Failed, RunPhase::TimedOut] {
            assert!(phase.is_terminal());
            assert_eq!(phase.on(RunEvent::DeadlineElapsed), phase);
            assert_eq!(phase.on(RunEvent::Status(RunStatus::Queued)), phase);
            assert_eq!(phase.on(RunEvent::RunCreated), phase);
        }
    }

    #[test]
    fn status_before_creation_is_ignored() {
        assert_eq!(
            RunPhase::Submitted.on(RunEvent::Status(RunStatus::Completed)),
            RunPhase::Submitted
        );
    }
}
