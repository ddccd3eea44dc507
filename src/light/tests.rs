use super::*;
use crate::agent::{Agent, AgentId};
use crate::blackboard::{Blackboard, Breakage, FactValue};
use crate::fsm::{State, TransitionError};
use crate::services::{Actuator, Clock, LampHandle, RandomSource, SimClock, Transform};
use crate::strip::{AmbientFlicker, Strip};
use std::any::Any;
use std::sync::Arc;

const ON: State<LightState> = State::Custom(LightState::On);
const FLICKER: State<LightState> = State::Custom(LightState::Flicker);
const DEAD: State<LightState> = State::Custom(LightState::Dead);

/// Every roll returns the same value
struct Fixed(f64);

impl RandomSource for Fixed {
    fn sample(&mut self) -> f64 {
        self.0
    }
}

struct Rig {
    board: Arc<Blackboard>,
    strip: Arc<AmbientFlicker>,
    clock: SimClock,
}

impl Rig {
    fn new() -> Self {
        let board = Arc::new(Blackboard::new());
        let strip = Arc::new(AmbientFlicker::new(Arc::clone(&board)));
        Self {
            board,
            strip,
            clock: SimClock::new(),
        }
    }

    fn light(&self, name: &str, params: FlickerParams, roll: f64) -> (SmartLight, LampHandle) {
        let lamp = LampHandle::new(false);
        let mut light = SmartLight::new(
            name,
            params,
            Arc::clone(&self.board),
            Box::new(lamp.clone()),
            Box::new(Fixed(roll)),
        );
        light.attach_strip(self.strip.clone());
        (light, lamp)
    }

    fn field(&self, key: &str, field: LightField) -> FactValue {
        self.board.get_field(key, field.index()).unwrap()
    }
}

fn params(prob_of_flicker: f64, prob_break: f64, prob_of_stop_flicker: f64) -> FlickerParams {
    FlickerParams {
        prob_of_flicker,
        prob_break,
        prob_of_stop_flicker,
        min_flicker_duration: 0.0,
        flicker_cooldown: 0.0,
        ..FlickerParams::default()
    }
}

#[test]
fn test_start_publishes_tuple() {
    let rig = Rig::new();
    let (mut light, lamp) = rig.light("hall-1", FlickerParams::default(), 0.5);
    let mut light_with_neighbors = {
        let (l, _) = rig.light("hall-2", FlickerParams::default(), 0.5);
        l.with_neighbors(vec!["hall-1".into(), "hall-3".into()])
    };

    assert!(light.start(&rig.clock));
    assert!(light_with_neighbors.start(&rig.clock));

    assert_eq!(light.state(), ON);
    assert_eq!(light.key(), Some("hall-1"));
    assert!(lamp.is_enabled());
    assert_eq!(
        rig.board.get_fields("hall-2").unwrap(),
        vec![
            FactValue::Int(1),
            FactValue::Float(0.0),
            FactValue::Float(0.0),
            FactValue::Text("false".into()),
            FactValue::Ref("hall-1".into()),
            FactValue::Ref("hall-3".into()),
        ]
    );
    assert_eq!(rig.board.owner_of("hall-1"), Some(light.id()));
}

#[test]
fn test_duplicate_name_falls_back_to_derived_key() {
    let mut rig = Rig::new();
    let (mut first, _) = rig.light("hall-1", params(0.0, 0.0, 0.0), 0.5);
    let (mut second, _) = rig.light("hall-1", params(1.0, 0.0, 0.0), 0.5);

    assert!(first.start(&rig.clock));
    assert!(second.start(&rig.clock));
    assert!(first.has_own_key());
    assert!(!second.has_own_key());

    let derived = second.id().derived_key();
    assert_eq!(second.key(), Some(derived.as_str()));
    assert_eq!(rig.board.owner_of(&derived), Some(second.id()));
    assert_eq!(rig.board.owner_of("hall-1"), Some(first.id()));

    // The renamed lamp still runs its rule against its own tuple
    rig.clock.advance(0.1);
    second.update(&rig.clock);
    assert_eq!(second.state(), FLICKER);
    assert_eq!(rig.field(&derived, LightField::State), FactValue::Int(2));
    assert_eq!(rig.field("hall-1", LightField::State), FactValue::Int(1));
}

#[test]
fn test_flicker_then_die() {
    let mut rig = Rig::new();
    let (mut light, lamp) = rig.light("hall-1", params(1.0, 1.0, 1.0), 0.5);
    light.start(&rig.clock);

    rig.clock.advance(0.1);
    light.update(&rig.clock);
    assert_eq!(light.state(), FLICKER);
    assert_eq!(rig.field("hall-1", LightField::State), FactValue::Int(2));
    assert_eq!(rig.field("hall-1", LightField::Broken), FactValue::from(Breakage::WillBreak));
    assert_eq!(rig.field("hall-1", LightField::StartFlicker), FactValue::Float(0.1));

    rig.clock.advance(0.1);
    light.update(&rig.clock);
    assert_eq!(light.state(), DEAD);
    assert_eq!(rig.field("hall-1", LightField::State), FactValue::Int(3));
    assert_eq!(rig.field("hall-1", LightField::Broken), FactValue::from(Breakage::Broken));
    assert!(!lamp.is_enabled());

    for _ in 0..20 {
        rig.clock.advance(0.1);
        light.update(&rig.clock);
    }
    assert_eq!(light.state(), DEAD);
    assert!(!lamp.is_enabled());
    assert_eq!(rig.strip.transitions_induced(), 2);
}

#[test]
fn test_dead_is_terminal() {
    let mut rig = Rig::new();
    let (mut light, _) = rig.light("hall-1", params(1.0, 1.0, 1.0), 0.5);
    light.start(&rig.clock);
    rig.clock.advance(0.1);
    light.update(&rig.clock);
    rig.clock.advance(0.1);
    light.update(&rig.clock);
    assert_eq!(light.state(), DEAD);

    for next in [ON, FLICKER, DEAD, State::Init] {
        assert_eq!(light.induce_transition(next), Err(TransitionError::Terminal(DEAD)));
        assert_eq!(light.state(), DEAD);
    }
    assert_eq!(rig.field("hall-1", LightField::State), FactValue::Int(3));
}

#[test]
fn test_flicker_back_to_on_when_intact() {
    let mut rig = Rig::new();
    let (mut light, lamp) = rig.light("hall-1", params(1.0, 0.0, 1.0), 0.5);
    light.start(&rig.clock);

    rig.clock.advance(0.1);
    light.update(&rig.clock);
    assert_eq!(light.state(), FLICKER);
    assert_eq!(rig.field("hall-1", LightField::Broken), FactValue::from(Breakage::Intact));

    rig.clock.advance(0.1);
    light.update(&rig.clock);
    assert_eq!(light.state(), ON);
    assert!(lamp.is_enabled());
}

#[test]
fn test_neighbor_flicker_vetoes() {
    let mut rig = Rig::new();
    let steady = FlickerParams {
        min_flicker_duration: 100.0,
        flicker_duration: 1000.0,
        ..params(1.0, 0.0, 0.0)
    };
    let (mut b, _) = rig.light("b", steady, 0.5);
    let (a, _) = rig.light("a", params(1.0, 0.0, 0.0), 0.5);
    let mut a = a.with_neighbors(vec!["b".into()]);
    b.start(&rig.clock);
    a.start(&rig.clock);

    rig.clock.advance(0.1);
    b.update(&rig.clock);
    a.update(&rig.clock);
    assert_eq!(b.state(), FLICKER);
    assert_eq!(a.state(), ON);

    rig.clock.advance(0.1);
    b.update(&rig.clock);
    a.update(&rig.clock);
    assert_eq!(b.state(), FLICKER);
    assert_eq!(a.state(), ON);

    // Once the neighbor settles the veto lifts
    b.induce_transition(ON).unwrap();
    assert_eq!(rig.field("b", LightField::State), FactValue::Int(1));

    rig.clock.advance(0.1);
    a.update(&rig.clock);
    assert_eq!(a.state(), FLICKER);
}

#[test]
fn test_min_duration_holds_flicker() {
    let mut rig = Rig::new();
    let held = FlickerParams {
        min_flicker_duration: 1.0,
        flicker_duration: 100.0,
        ..params(1.0, 0.0, 1.0)
    };
    let (mut light, _) = rig.light("hall-1", held, 0.5);
    light.start(&rig.clock);

    rig.clock.advance(0.25);
    light.update(&rig.clock);
    assert_eq!(light.state(), FLICKER);

    // Flickered 0, 0.25, 0.5, 0.75 seconds at evaluation: keep going
    for _ in 0..4 {
        rig.clock.advance(0.25);
        light.update(&rig.clock);
        assert_eq!(light.state(), FLICKER);
    }
    assert_eq!(rig.field("hall-1", LightField::LastFlicker), FactValue::Float(1.25));

    rig.clock.advance(0.25);
    light.update(&rig.clock);
    assert_eq!(light.state(), ON);
}

#[test]
fn test_cooldown_blocks_next_flicker() {
    let mut rig = Rig::new();
    let cooled = FlickerParams {
        flicker_cooldown: 3.0,
        ..params(1.0, 0.0, 1.0)
    };
    let (mut light, _) = rig.light("hall-1", cooled, 0.5);
    light.start(&rig.clock);

    // Registration counts as the last flicker start
    rig.clock.advance(1.0);
    light.update(&rig.clock);
    assert_eq!(light.state(), ON);

    rig.clock.advance(2.0);
    light.update(&rig.clock);
    assert_eq!(light.state(), FLICKER);

    rig.clock.advance(1.0);
    light.update(&rig.clock);
    assert_eq!(light.state(), ON);

    rig.clock.advance(1.0);
    light.update(&rig.clock);
    assert_eq!(light.state(), ON);

    rig.clock.advance(1.0);
    light.update(&rig.clock);
    assert_eq!(light.state(), FLICKER);
}

#[test]
fn test_invalid_transition_resets_light() {
    let rig = Rig::new();
    let origin = Transform {
        position: [1.0, 3.0, 0.0],
        ..Transform::default()
    };
    let (light, _) = rig.light("hall-1", params(0.0, 0.0, 0.0), 0.5);
    let mut light = light.with_transform(origin);
    light.start(&rig.clock);

    light.set_transform(Transform::default());
    let result = light.induce_transition(DEAD);

    assert_eq!(result, Err(TransitionError::Undeclared { from: ON, to: DEAD }));
    assert_eq!(light.state(), ON);
    assert_eq!(light.transform(), origin);
    assert_eq!(light.machine().pending(), None);

    assert!(light.induce_transition(State::Init).is_err());
    assert_eq!(light.state(), ON);
    assert_eq!(rig.field("hall-1", LightField::State), FactValue::Int(1));
}

#[test]
fn test_recovery_leaves_neighbor_alone() {
    let mut rig = Rig::new();
    let steady = FlickerParams {
        min_flicker_duration: 100.0,
        flicker_duration: 1000.0,
        ..params(1.0, 0.0, 0.0)
    };
    let (a, _) = rig.light("a", params(0.0, 0.0, 0.0), 0.5);
    let mut a = a.with_transform(Transform {
        position: [2.0, 0.0, 0.0],
        ..Transform::default()
    });
    let (mut b, b_lamp) = rig.light("b", steady, 0.0);
    a.start(&rig.clock);
    b.start(&rig.clock);

    rig.clock.advance(0.1);
    a.update(&rig.clock);
    b.update(&rig.clock);
    assert_eq!(b.state(), FLICKER);
    let switches = b_lamp.switches();
    let b_before = rig.board.get_fields("b");

    a.set_transform(Transform::default());
    assert!(a.induce_transition(DEAD).is_err());
    assert_eq!(a.state(), ON);
    assert_eq!(a.transform().position, [2.0, 0.0, 0.0]);

    // B's tuple and machine are untouched by A's recovery
    assert_eq!(rig.board.get_fields("b"), b_before);
    assert_eq!(b.state(), FLICKER);

    rig.clock.advance(0.1);
    a.update(&rig.clock);
    b.update(&rig.clock);
    assert_eq!(b.state(), FLICKER);
    assert!(b_lamp.switches() > switches);
    assert_eq!(rig.field("b", LightField::LastFlicker), FactValue::Float(0.2));
}

#[test]
fn test_flicker_routine_toggles_lamp() {
    let board = Arc::new(Blackboard::new());
    let lamp = LampHandle::new(false);
    let mut clock = SimClock::new();
    let mut light = SmartLight::new(
        "bare",
        FlickerParams::default(),
        board,
        Box::new(lamp.clone()),
        Box::new(Fixed(0.0)),
    );
    light.start(&clock);
    light.induce_transition(FLICKER).unwrap();

    for _ in 0..4 {
        clock.advance(0.1);
        light.update(&clock);
    }
    // On at start, then one toggle per tick
    assert_eq!(lamp.switches(), 5);
    assert!(lamp.is_enabled());
}

struct Bystander {
    id: AgentId,
}

impl Agent for Bystander {
    fn id(&self) -> AgentId {
        self.id
    }

    fn name(&self) -> &str {
        "bystander"
    }

    fn key(&self) -> Option<&str> {
        Some("hall-1")
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn test_strip_ignores_other_agents() {
    let mut rig = Rig::new();
    let (mut light, _) = rig.light("hall-1", params(1.0, 1.0, 1.0), 0.5);
    light.start(&rig.clock);
    let before = rig.board.get_fields("hall-1");

    rig.clock.advance(0.1);
    let mut bystander = Bystander { id: AgentId::new() };
    rig.strip.action(&mut bystander, &rig.clock);

    assert_eq!(rig.board.get_fields("hall-1"), before);
    assert_eq!(rig.strip.transitions_induced(), 0);
    assert_eq!(rig.clock.now(), 0.1);
}
