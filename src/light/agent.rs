use crate::agent::{Agent, AgentId};
use crate::blackboard::{Blackboard, BlackboardClient, Breakage, FactValue};
use crate::fsm::{State, StateMachine, TransitionError};
use crate::light::routines::{light_dead, light_flicker, light_on};
use crate::light::{FlickerParams, LightFacts, LightField, LightState};
use crate::services::{Actuator, Clock, RandomSource, Spatial, Transform};
use crate::strip::{FlickerTarget, Strip, AMBIENT_FLICKER};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

const ON: State<LightState> = State::Custom(LightState::On);
const FLICKER: State<LightState> = State::Custom(LightState::Flicker);
const DEAD: State<LightState> = State::Custom(LightState::Dead);

/// What the lamp's routines act on
pub struct LightHost {
    pub(super) lamp: Box<dyn Actuator>,
    pub(super) rng: Box<dyn RandomSource>,
    pub(super) transform: Transform,
    pub(super) max_flicker_wait: f64,
}

impl Spatial for LightHost {
    fn transform(&self) -> Transform {
        self.transform
    }

    fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }
}

/// A lamp that occasionally flickers and may burn out for good.
///
/// Flicker decisions come from the selected strip, which reads and writes
/// this lamp's tuple on the blackboard and induces transitions here.
pub struct SmartLight {
    id: AgentId,
    name: String,
    params: FlickerParams,
    neighbors: Vec<String>,
    machine: StateMachine<LightState, LightHost>,
    host: LightHost,
    client: BlackboardClient,
    strips: HashMap<String, Arc<dyn Strip>>,
    strip_name: String,
}

impl SmartLight {
    pub fn new(
        name: impl Into<String>,
        params: FlickerParams,
        board: Arc<Blackboard>,
        lamp: Box<dyn Actuator>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let name = name.into();

        let mut machine = StateMachine::new(name.clone(), ON);
        machine.remove_state(State::Init);
        machine.add_state(ON, light_on);
        machine.add_state(FLICKER, light_flicker);
        machine.add_state(DEAD, light_dead);
        machine.add_transitions(ON, &[FLICKER]);
        machine.add_transitions(FLICKER, &[ON, DEAD]);
        machine.mark_terminal(DEAD);

        let host = LightHost {
            lamp,
            rng,
            transform: Transform::default(),
            max_flicker_wait: params.max_flicker_wait,
        };

        Self {
            id: AgentId::new(),
            name,
            params,
            neighbors: Vec::new(),
            machine,
            host,
            client: BlackboardClient::new(board),
            strips: HashMap::new(),
            strip_name: AMBIENT_FLICKER.to_string(),
        }
    }

    /// Keys of the lamps whose flickering holds this one back
    pub fn with_neighbors(mut self, neighbors: Vec<String>) -> Self {
        self.neighbors = neighbors;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.host.transform = transform;
        self
    }

    /// Strip run each tick, by id
    pub fn with_strip_name(mut self, strip_name: impl Into<String>) -> Self {
        self.strip_name = strip_name.into();
        self
    }

    pub fn attach_strip(&mut self, strip: Arc<dyn Strip>) {
        self.strips.insert(strip.id().to_string(), strip);
    }

    /// Turn on, snapshot the initial configuration, enter the start state
    /// and publish the lamp's tuple under its name, or under the key derived
    /// from its id when the name is taken. Returns whether the lamp got a
    /// blackboard key.
    pub fn start(&mut self, clock: &dyn Clock) -> bool {
        self.host.lamp.set_enabled(true);
        self.machine.record_initial(&self.host);

        if !self.machine.start(&mut self.host) {
            warn!(light = %self.name, "Start state unavailable");
        }

        let now = clock.now();
        let facts = LightFacts {
            state: Some(self.machine.current()),
            start_flicker: now,
            last_flicker: now,
            broken: Breakage::Intact,
            neighbors: self.neighbors.clone(),
        };

        let fields = facts.to_fields();
        let mut registered = self.client.register(self.id, fields.clone(), Some(&self.name));
        if !registered {
            // Name taken: fall back to the key derived from the agent id
            registered = self.client.register(self.id, fields, None);
        }

        match self.client.key() {
            Some(key) if registered => info!(
                light = %self.name,
                key = %key,
                neighbors = self.neighbors.len(),
                "Light started"
            ),
            _ => warn!(light = %self.name, "Light started without a blackboard key"),
        }
        registered
    }

    /// Whether the lamp is registered under its own name
    pub fn has_own_key(&self) -> bool {
        self.client.key() == Some(self.name.as_str())
    }

    /// One simulation tick: run the rule, then the current state's routine
    pub fn update(&mut self, clock: &dyn Clock) {
        match self.strips.get(&self.strip_name).cloned() {
            Some(strip) => strip.action(self, clock),
            None => trace!(light = %self.name, strip = %self.strip_name, "No strip attached"),
        }

        self.machine.tick(&mut self.host, clock);
    }

    /// Request a state change. A rejected request resets the lamp through
    /// bad-state recovery (except out of DEAD, which is final).
    pub fn induce_transition(
        &mut self,
        next: State<LightState>,
    ) -> Result<(), TransitionError<LightState>> {
        let result = self.machine.induce_transition(next, &mut self.host);
        self.publish_state();

        if self.machine.current() == DEAD && result.is_ok() {
            info!(light = %self.name, "Light died");
        }
        result
    }

    /// Keep the STATE fact in line with the machine
    fn publish_state(&self) {
        let Some(key) = self.client.key() else {
            return;
        };

        let code = FactValue::Int(self.machine.current().code());
        let index = LightField::State.index();
        let stale = self.client.board().get_field(key, index).as_ref() != Some(&code);
        if stale && !self.client.update(index, code) {
            debug!(light = %self.name, "Could not publish state");
        }
    }

    /// Uniform sample in [0, 1) from the lamp's random source
    pub fn roll(&mut self) -> f64 {
        self.host.rng.sample()
    }

    pub fn state(&self) -> State<LightState> {
        self.machine.current()
    }

    pub fn machine(&self) -> &StateMachine<LightState, LightHost> {
        &self.machine
    }

    pub fn params(&self) -> &FlickerParams {
        &self.params
    }

    pub fn neighbors(&self) -> &[String] {
        &self.neighbors
    }

    pub fn lamp_enabled(&self) -> bool {
        self.host.lamp.is_enabled()
    }

    pub fn transform(&self) -> Transform {
        self.host.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.host.transform = transform;
    }

    pub fn client(&self) -> &BlackboardClient {
        &self.client
    }
}

impl Agent for SmartLight {
    fn id(&self) -> AgentId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn key(&self) -> Option<&str> {
        self.client.key()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn flicker_target(&mut self) -> Option<&mut dyn FlickerTarget> {
        Some(self)
    }
}

impl FlickerTarget for SmartLight {
    fn params(&self) -> &FlickerParams {
        &self.params
    }

    fn roll(&mut self) -> f64 {
        self.host.rng.sample()
    }

    fn induce_transition(
        &mut self,
        next: State<LightState>,
    ) -> Result<(), TransitionError<LightState>> {
        SmartLight::induce_transition(self, next)
    }
}
