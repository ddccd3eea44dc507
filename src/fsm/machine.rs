use crate::fsm::state::{State, StateTag};
use crate::services::{Clock, Spatial, Transform};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, trace, warn};

/// Per-state behavior, polled once per tick while its state is current.
///
/// Returning from `poll` is the tick's only suspension point.
pub trait Routine<C>: Send {
    fn poll(&mut self, host: &mut C, clock: &dyn Clock);
}

impl<C, F> Routine<C> for F
where
    F: FnMut(&mut C, &dyn Clock) + Send,
{
    fn poll(&mut self, host: &mut C, clock: &dyn Clock) {
        self(host, clock)
    }
}

/// Box a closure as a routine
pub fn routine<C, F>(f: F) -> Box<dyn Routine<C>>
where
    C: 'static,
    F: FnMut(&mut C, &dyn Clock) + Send + 'static,
{
    Box::new(f)
}

/// Builds a fresh routine each time its state is entered
type RoutineFactory<C> = Box<dyn Fn() -> Box<dyn Routine<C>> + Send>;

/// Idle behavior used when nothing else can run
fn ready<C: 'static>() -> Box<dyn Routine<C>> {
    routine(|_: &mut C, clock: &dyn Clock| {
        trace!(now = clock.now(), "Ready to do something");
    })
}

/// Configuration restored by bad-state recovery
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InitSnapshot<S> {
    pub transform: Transform,
    pub start_state: State<S>,
}

/// Rejected induced transition
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionError<S> {
    /// No `from -> to` row in the transition table
    Undeclared { from: State<S>, to: State<S> },
    /// Declared, but nothing registered to run in the target state
    NoBehavior(State<S>),
    /// Current state has no way out
    Terminal(State<S>),
}

impl<S: StateTag> fmt::Display for TransitionError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::Undeclared { from, to } => {
                write!(f, "no transition declared from {} to {}", from, to)
            }
            TransitionError::NoBehavior(state) => {
                write!(f, "no behavior registered for {}", state)
            }
            TransitionError::Terminal(state) => write!(f, "{} is terminal", state),
        }
    }
}

impl<S: StateTag> std::error::Error for TransitionError<S> {}

struct Active<S, C> {
    state: State<S>,
    routine: Box<dyn Routine<C>>,
}

/// Generic finite state machine driving one agent.
///
/// `S` is the agent's state enumeration, `C` the host the routines act on
/// (actuators, transform). Routines only ever see the host, never the
/// machine, so a transition cannot be induced from inside one.
pub struct StateMachine<S: StateTag, C> {
    name: String,
    current: State<S>,
    /// Target for the next recovery; None means "not a state"
    pending: Option<State<S>>,
    behaviors: HashMap<State<S>, RoutineFactory<C>>,
    transitions: HashMap<State<S>, Vec<State<S>>>,
    terminal: HashSet<State<S>>,
    active: Option<Active<S, C>>,
    initial: InitSnapshot<S>,
}

impl<S: StateTag, C: Spatial + 'static> StateMachine<S, C> {
    /// Default two-state machine: INIT runs an idle routine, BAD leads to INIT
    pub fn new(name: impl Into<String>, start_state: State<S>) -> Self {
        let mut behaviors: HashMap<State<S>, RoutineFactory<C>> = HashMap::new();
        behaviors.insert(State::Init, Box::new(ready::<C>));

        let mut transitions = HashMap::new();
        transitions.insert(State::Bad, vec![State::Init]);

        Self {
            name: name.into(),
            current: State::Init,
            pending: None,
            behaviors,
            transitions,
            terminal: HashSet::new(),
            active: None,
            initial: InitSnapshot {
                transform: Transform::default(),
                start_state,
            },
        }
    }

    /// Register (or replace) the routine run while in `state`.
    ///
    /// BAD has no routine: leaving it is [`Self::leave_bad_state`].
    pub fn add_state<F>(&mut self, state: State<S>, factory: F)
    where
        F: Fn() -> Box<dyn Routine<C>> + Send + 'static,
    {
        if state == State::Bad {
            warn!(machine = %self.name, "Ignoring routine for BAD state");
            return;
        }
        self.behaviors.insert(state, Box::new(factory));
    }

    /// Drop a state's routine, e.g. the default INIT once specialised
    pub fn remove_state(&mut self, state: State<S>) -> bool {
        self.behaviors.remove(&state).is_some()
    }

    /// Append allowed targets to `from`'s row. Existing rows only grow.
    pub fn add_transitions(&mut self, from: State<S>, to: &[State<S>]) {
        let row = self.transitions.entry(from).or_default();
        for target in to {
            if !row.contains(target) {
                row.push(*target);
            }
        }
    }

    /// Refuse every induced transition out of `state`
    pub fn mark_terminal(&mut self, state: State<S>) {
        self.terminal.insert(state);
    }

    /// Capture the host's transform as the recovery snapshot
    pub fn record_initial(&mut self, host: &C) {
        self.initial.transform = host.transform();
    }

    /// Enter the start state. Falls back to recovery if it has no routine.
    pub fn start(&mut self, host: &mut C) -> bool {
        let start = self.initial.start_state;
        if self.enter(start) {
            debug!(machine = %self.name, state = %start, "State machine started");
            return true;
        }

        warn!(machine = %self.name, state = %start, "Start state has no behavior");
        self.pending = Some(start);
        self.leave_bad_state(host);
        false
    }

    /// Pure lookup: is `next` reachable from the current state in one step?
    pub fn exists_transition(&self, next: State<S>) -> bool {
        self.transitions
            .get(&self.current)
            .map(|row| row.contains(&next))
            .unwrap_or(false)
    }

    /// Externally request a state change.
    ///
    /// On success the old routine is dropped before the new one is built.
    /// An undeclared target or one without a routine sends the machine
    /// through bad-state recovery back to its start state.
    pub fn induce_transition(
        &mut self,
        next: State<S>,
        host: &mut C,
    ) -> Result<(), TransitionError<S>> {
        let from = self.current;

        if self.terminal.contains(&from) {
            debug!(
                machine = %self.name,
                state = %from,
                to = %next,
                "Terminal state, transition refused"
            );
            return Err(TransitionError::Terminal(from));
        }

        let error = if !self.exists_transition(next) {
            TransitionError::Undeclared { from, to: next }
        } else if !self.behaviors.contains_key(&next) {
            TransitionError::NoBehavior(next)
        } else {
            self.enter(next);
            self.pending = None;
            debug!(machine = %self.name, from = %from, to = %next, "Transition");
            return Ok(());
        };

        warn!(machine = %self.name, error = %error, "Invalid transition, recovering");
        self.pending = Some(self.initial.start_state);
        self.leave_bad_state(host);
        Err(error)
    }

    /// Recovery: stop everything, restore the initial snapshot, then run the
    /// pending state, else INIT, else an idle routine. Safe to repeat.
    pub fn leave_bad_state(&mut self, host: &mut C) {
        self.active = None;
        self.current = State::Bad;
        host.set_transform(self.initial.transform);

        let target = self.pending.take().unwrap_or(self.initial.start_state);
        if self.enter(target) {
            info!(machine = %self.name, state = %target, "Recovered from bad state");
            return;
        }
        if self.enter(State::Init) {
            info!(machine = %self.name, "Recovered into INIT");
            return;
        }

        warn!(machine = %self.name, "No behavior to recover into, idling in INIT");
        self.current = State::Init;
        self.active = Some(Active {
            state: State::Init,
            routine: ready::<C>(),
        });
    }

    /// Run one tick of the active routine, if it still belongs to the
    /// current state
    pub fn tick(&mut self, host: &mut C, clock: &dyn Clock) {
        if let Some(active) = self.active.as_mut() {
            if active.state == self.current {
                active.routine.poll(host, clock);
            }
        }
    }

    fn enter(&mut self, state: State<S>) -> bool {
        // Cancel before starting so two routines never share a tick
        self.active = None;
        match self.behaviors.get(&state) {
            Some(factory) => {
                self.current = state;
                self.active = Some(Active {
                    state,
                    routine: factory(),
                });
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> State<S> {
        self.current
    }

    pub fn pending(&self) -> Option<State<S>> {
        self.pending
    }

    /// State whose routine is live, if any
    pub fn active_state(&self) -> Option<State<S>> {
        self.active.as_ref().map(|a| a.state)
    }

    pub fn has_behavior(&self, state: State<S>) -> bool {
        self.behaviors.contains_key(&state)
    }

    pub fn initial(&self) -> &InitSnapshot<S> {
        &self.initial
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
