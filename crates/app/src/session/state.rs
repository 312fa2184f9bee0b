use std::collections::HashMap;

use thiserror::Error;

use echohub_protocol::AudioMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStateKind {
    Idle,
    Connecting,
    Listening,
    Speaking,
}

impl std::fmt::Display for SessionStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Listening => "listening",
            Self::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    Invalid {
        from: SessionStateKind,
        to: SessionStateKind,
    },

    #[error("Enter callback failed moving {from} -> {to}: {reason}")]
    EnterFailed {
        from: SessionStateKind,
        to: SessionStateKind,
        reason: String,
    },

    #[error("Exit callbacks failed after {from} -> {to}: {reasons:?}")]
    ExitFailed {
        from: SessionStateKind,
        to: SessionStateKind,
        reasons: Vec<String>,
    },
}

pub type TransitionCallback<C> =
    Box<dyn FnMut(&mut C, SessionStateKind, SessionStateKind) -> Result<(), String> + Send>;

/// Per-session state machine. The valid-transition table and the
/// enter/exit callback maps are seeded when the audio mode is assigned;
/// the current state only ever changes through `transit_to`.
pub struct StateMachine<C> {
    current: SessionStateKind,
    valid: HashMap<SessionStateKind, Vec<SessionStateKind>>,
    on_enter: HashMap<SessionStateKind, Vec<TransitionCallback<C>>>,
    on_exit: HashMap<SessionStateKind, Vec<TransitionCallback<C>>>,
}

impl<C> StateMachine<C> {
    pub fn new(initial: SessionStateKind) -> Self {
        Self {
            current: initial,
            valid: HashMap::new(),
            on_enter: HashMap::new(),
            on_exit: HashMap::new(),
        }
    }

    pub fn allow(&mut self, from: SessionStateKind, to: &[SessionStateKind]) {
        self.valid.entry(from).or_default().extend_from_slice(to);
    }

    pub fn on_enter(&mut self, state: SessionStateKind, callback: TransitionCallback<C>) {
        self.on_enter.entry(state).or_default().push(callback);
    }

    pub fn on_exit(&mut self, state: SessionStateKind, callback: TransitionCallback<C>) {
        self.on_exit.entry(state).or_default().push(callback);
    }

    pub fn current(&self) -> SessionStateKind {
        self.current
    }

    pub fn is_valid_transition(&self, to: SessionStateKind) -> bool {
        self.valid
            .get(&self.current)
            .map(|targets| targets.contains(&to))
            .unwrap_or(false)
    }

    /// Validate, run the target's enter callbacks (first failure aborts
    /// with the state unchanged), commit, then run the previous state's
    /// exit callbacks (failures are collected, the commit stands).
    pub fn transit_to(&mut self, ctx: &mut C, to: SessionStateKind) -> Result<(), TransitionError> {
        if !self.is_valid_transition(to) {
            return Err(TransitionError::Invalid {
                from: self.current,
                to,
            });
        }

        let from = self.current;

        if let Some(callbacks) = self.on_enter.get_mut(&to) {
            for callback in callbacks.iter_mut() {
                callback(ctx, from, to).map_err(|reason| TransitionError::EnterFailed {
                    from,
                    to,
                    reason,
                })?;
            }
        }

        self.current = to;

        let mut reasons = Vec::new();
        if let Some(callbacks) = self.on_exit.get_mut(&from) {
            for callback in callbacks.iter_mut() {
                if let Err(reason) = callback(ctx, from, to) {
                    reasons.push(reason);
                }
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(TransitionError::ExitFailed { from, to, reasons })
        }
    }
}

/// Seed the per-mode transition table.
///
/// auto (and realtime, which streams the same way): the device sends
/// audio continuously and the hub decides when to speak. manual is
/// push-to-talk. `none` is the pre-hello sentinel with no legal moves.
pub fn build_state<C>(mode: AudioMode) -> StateMachine<C> {
    use SessionStateKind::*;

    match mode {
        AudioMode::Auto | AudioMode::Realtime => {
            let mut machine = StateMachine::new(Listening);
            machine.allow(Idle, &[Connecting]);
            machine.allow(Connecting, &[Listening, Idle]);
            machine.allow(Listening, &[Speaking, Idle]);
            machine.allow(Speaking, &[Listening, Idle]);
            machine
        }
        AudioMode::Manual => {
            let mut machine = StateMachine::new(Idle);
            machine.allow(Idle, &[Connecting, Speaking, Listening]);
            machine.allow(Connecting, &[Listening, Idle]);
            machine.allow(Listening, &[Idle]);
            machine.allow(Speaking, &[Idle]);
            machine
        }
        AudioMode::None => StateMachine::new(Idle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionStateKind::*;

    #[derive(Default)]
    struct Trace {
        events: Vec<String>,
    }

    #[test]
    fn auto_mode_starts_listening() {
        let machine = build_state::<Trace>(AudioMode::Auto);
        assert_eq!(machine.current(), Listening);
    }

    #[test]
    fn manual_mode_starts_idle() {
        let machine = build_state::<Trace>(AudioMode::Manual);
        assert_eq!(machine.current(), Idle);
    }

    #[test]
    fn auto_listening_to_speaking_succeeds() {
        let mut machine = build_state::<Trace>(AudioMode::Auto);
        let mut ctx = Trace::default();
        machine.transit_to(&mut ctx, Speaking).unwrap();
        assert_eq!(machine.current(), Speaking);
    }

    #[test]
    fn auto_listening_to_connecting_is_invalid() {
        let mut machine = build_state::<Trace>(AudioMode::Auto);
        let mut ctx = Trace::default();
        let err = machine.transit_to(&mut ctx, Connecting).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Invalid {
                from: Listening,
                to: Connecting
            }
        ));
        assert_eq!(machine.current(), Listening);
    }

    #[test]
    fn none_mode_permits_nothing() {
        let mut machine = build_state::<Trace>(AudioMode::None);
        let mut ctx = Trace::default();
        for target in [Connecting, Listening, Speaking] {
            assert!(machine.transit_to(&mut ctx, target).is_err());
        }
        assert_eq!(machine.current(), Idle);
    }

    #[test]
    fn manual_round_trip() {
        let mut machine = build_state::<Trace>(AudioMode::Manual);
        let mut ctx = Trace::default();
        machine.transit_to(&mut ctx, Listening).unwrap();
        machine.transit_to(&mut ctx, Idle).unwrap();
        machine.transit_to(&mut ctx, Speaking).unwrap();
        machine.transit_to(&mut ctx, Idle).unwrap();
    }

    #[test]
    fn enter_callbacks_run_in_registration_order_before_commit() {
        let mut machine = build_state::<Trace>(AudioMode::Auto);
        machine.on_enter(
            Speaking,
            Box::new(|ctx: &mut Trace, from, to| {
                ctx.events.push(format!("first:{from}->{to}"));
                Ok(())
            }),
        );
        machine.on_enter(
            Speaking,
            Box::new(|ctx: &mut Trace, _, _| {
                ctx.events.push("second".to_string());
                Ok(())
            }),
        );

        let mut ctx = Trace::default();
        machine.transit_to(&mut ctx, Speaking).unwrap();
        assert_eq!(ctx.events, vec!["first:listening->speaking", "second"]);
    }

    #[test]
    fn enter_failure_leaves_state_unchanged() {
        let mut machine = build_state::<Trace>(AudioMode::Auto);
        machine.on_enter(
            Speaking,
            Box::new(|_: &mut Trace, _, _| Err("refused".to_string())),
        );
        machine.on_enter(
            Speaking,
            Box::new(|ctx: &mut Trace, _, _| {
                ctx.events.push("must not run".to_string());
                Ok(())
            }),
        );

        let mut ctx = Trace::default();
        let err = machine.transit_to(&mut ctx, Speaking).unwrap_err();
        assert!(matches!(err, TransitionError::EnterFailed { .. }));
        assert_eq!(machine.current(), Listening);
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn exit_failure_keeps_the_commit() {
        let mut machine = build_state::<Trace>(AudioMode::Auto);
        machine.on_exit(
            Listening,
            Box::new(|_: &mut Trace, _, _| Err("cleanup failed".to_string())),
        );

        let mut ctx = Trace::default();
        let err = machine.transit_to(&mut ctx, Speaking).unwrap_err();
        assert!(matches!(err, TransitionError::ExitFailed { .. }));
        assert_eq!(machine.current(), Speaking);
    }

    #[test]
    fn exit_callbacks_fire_for_the_state_being_left() {
        let mut machine = build_state::<Trace>(AudioMode::Auto);
        machine.on_exit(
            Listening,
            Box::new(|ctx: &mut Trace, from, to| {
                ctx.events.push(format!("exit:{from}->{to}"));
                Ok(())
            }),
        );

        let mut ctx = Trace::default();
        machine.transit_to(&mut ctx, Speaking).unwrap();
        assert_eq!(ctx.events, vec!["exit:listening->speaking"]);
    }
}
