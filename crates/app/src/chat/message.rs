use popchat_replies::ExchangeTarget;

/// Lifecycle of the exchange that currently holds the reply slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExchangeState {
    #[default]
    Idle,
    Submitting(ExchangeTarget),
    Awaiting(ExchangeTarget),
    Resolved(ExchangeTarget),
    Failed {
        target: ExchangeTarget,
        message: String,
    },
    Cancelled(ExchangeTarget),
}

/// State transition input for the exchange lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeTransition {
    Submit(ExchangeTarget),
    Dispatch(ExchangeTarget),
    Resolve(ExchangeTarget),
    Fail {
        target: ExchangeTarget,
        message: String,
    },
    Cancel(ExchangeTarget),
    ResetToIdle,
}

/// Rejection reason for illegal exchange transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeTransitionRejection {
    AlreadyActive {
        active: ExchangeTarget,
        attempted: ExchangeTarget,
    },
    NotSubmitting,
    NoActiveExchange,
    TargetMismatch {
        active: ExchangeTarget,
        attempted: ExchangeTarget,
    },
}

pub type ExchangeTransitionResult = Result<ExchangeState, ExchangeTransitionRejection>;

impl ExchangeState {
    /// Returns the target while an exchange is submitting or awaiting its reply.
    pub fn active_target(&self) -> Option<ExchangeTarget> {
        match self {
            Self::Submitting(target) | Self::Awaiting(target) => Some(*target),
            Self::Idle | Self::Resolved(_) | Self::Failed { .. } | Self::Cancelled(_) => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active_target().is_some()
    }

    /// Applies one transition deterministically.
    ///
    /// Settled states may start a new exchange directly. Terminal transitions must
    /// name the awaited exchange exactly.
    pub fn apply(&self, transition: ExchangeTransition) -> ExchangeTransitionResult {
        match transition {
            ExchangeTransition::Submit(target) => self.apply_submit(target),
            ExchangeTransition::Dispatch(target) => self.apply_dispatch(target),
            ExchangeTransition::Resolve(target) => {
                self.apply_terminal(target, Self::Resolved(target))
            }
            ExchangeTransition::Fail { target, message } => {
                self.apply_terminal(target, Self::Failed { target, message })
            }
            ExchangeTransition::Cancel(target) => self.apply_cancel(target),
            ExchangeTransition::ResetToIdle => Ok(Self::Idle),
        }
    }

    fn apply_submit(&self, target: ExchangeTarget) -> ExchangeTransitionResult {
        match self {
            Self::Submitting(active) | Self::Awaiting(active) => {
                Err(ExchangeTransitionRejection::AlreadyActive {
                    active: *active,
                    attempted: target,
                })
            }
            Self::Idle | Self::Resolved(_) | Self::Failed { .. } | Self::Cancelled(_) => {
                Ok(Self::Submitting(target))
            }
        }
    }

    fn apply_dispatch(&self, target: ExchangeTarget) -> ExchangeTransitionResult {
        match self {
            Self::Submitting(active) if *active == target => Ok(Self::Awaiting(target)),
            Self::Submitting(active) => Err(ExchangeTransitionRejection::TargetMismatch {
                active: *active,
                attempted: target,
            }),
            Self::Idle
            | Self::Awaiting(_)
            | Self::Resolved(_)
            | Self::Failed { .. }
            | Self::Cancelled(_) => Err(ExchangeTransitionRejection::NotSubmitting),
        }
    }

    fn apply_terminal(&self, target: ExchangeTarget, next: Self) -> ExchangeTransitionResult {
        match self {
            Self::Awaiting(active) if *active == target => Ok(next),
            Self::Awaiting(active) => Err(ExchangeTransitionRejection::TargetMismatch {
                active: *active,
                attempted: target,
            }),
            Self::Idle
            | Self::Submitting(_)
            | Self::Resolved(_)
            | Self::Failed { .. }
            | Self::Cancelled(_) => Err(ExchangeTransitionRejection::NoActiveExchange),
        }
    }

    fn apply_cancel(&self, target: ExchangeTarget) -> ExchangeTransitionResult {
        match self {
            Self::Submitting(active) | Self::Awaiting(active) if *active == target => {
                Ok(Self::Cancelled(target))
            }
            Self::Submitting(active) | Self::Awaiting(active) => {
                Err(ExchangeTransitionRejection::TargetMismatch {
                    active: *active,
                    attempted: target,
                })
            }
            Self::Idle | Self::Resolved(_) | Self::Failed { .. } | Self::Cancelled(_) => {
                Err(ExchangeTransitionRejection::NoActiveExchange)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use popchat_conversation::SessionId;
    use popchat_replies::ExchangeId;

    use super::*;

    fn targets() -> (ExchangeTarget, ExchangeTarget) {
        let session_id = SessionId::new_v7();
        (
            ExchangeTarget::new(session_id, ExchangeId::new(1)),
            ExchangeTarget::new(session_id, ExchangeId::new(2)),
        )
    }

    #[test]
    fn full_cycle_returns_to_idle() {
        let (first, _) = targets();
        let state = ExchangeState::Idle
            .apply(ExchangeTransition::Submit(first))
            .and_then(|state| state.apply(ExchangeTransition::Dispatch(first)))
            .expect("submit and dispatch");
        assert_eq!(state.active_target(), Some(first));
        assert!(state.is_busy());

        let resolved = state
            .apply(ExchangeTransition::Resolve(first))
            .expect("resolve");
        assert_eq!(resolved, ExchangeState::Resolved(first));
        assert!(!resolved.is_busy());
        assert_eq!(
            resolved.apply(ExchangeTransition::ResetToIdle),
            Ok(ExchangeState::Idle)
        );
    }

    #[test]
    fn second_submit_while_awaiting_is_rejected() {
        let (first, second) = targets();
        let state = ExchangeState::Awaiting(first);
        assert_eq!(
            state.apply(ExchangeTransition::Submit(second)),
            Err(ExchangeTransitionRejection::AlreadyActive {
                active: first,
                attempted: second,
            })
        );
    }

    #[test]
    fn stale_terminal_transitions_are_rejected() {
        let (first, second) = targets();
        let state = ExchangeState::Awaiting(second);
        assert_eq!(state.active_target(), Some(second));
        assert_eq!(
            state.apply(ExchangeTransition::Resolve(first)),
            Err(ExchangeTransitionRejection::TargetMismatch {
                active: second,
                attempted: first,
            })
        );
        assert_eq!(
            ExchangeState::Idle.apply(ExchangeTransition::Fail {
                target: first,
                message: "boom".to_string(),
            }),
            Err(ExchangeTransitionRejection::NoActiveExchange)
        );
    }

    #[test]
    fn failed_state_may_start_a_new_exchange() {
        let (first, second) = targets();
        let failed = ExchangeState::Failed {
            target: first,
            message: "offline".to_string(),
        };
        assert_eq!(
            failed.apply(ExchangeTransition::Submit(second)),
            Ok(ExchangeState::Submitting(second))
        );
    }

    #[test]
    fn dispatch_requires_submitting() {
        let (first, _) = targets();
        assert_eq!(
            ExchangeState::Idle.apply(ExchangeTransition::Dispatch(first)),
            Err(ExchangeTransitionRejection::NotSubmitting)
        );
        assert_eq!(
            ExchangeState::Submitting(first).apply(ExchangeTransition::Cancel(first)),
            Ok(ExchangeState::Cancelled(first))
        );
    }
}
