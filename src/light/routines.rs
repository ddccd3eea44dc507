use crate::fsm::{routine, Routine};
use crate::light::LightHost;
use crate::services::Clock;
use tracing::trace;

pub(super) fn light_on() -> Box<dyn Routine<LightHost>> {
    routine(|host: &mut LightHost, _: &dyn Clock| host.lamp.set_enabled(true))
}

/// Permanently off
pub(super) fn light_dead() -> Box<dyn Routine<LightHost>> {
    routine(|host: &mut LightHost, _: &dyn Clock| host.lamp.set_enabled(false))
}

pub(super) fn light_flicker() -> Box<dyn Routine<LightHost>> {
    Box::new(Flicker { next_change: None })
}

/// Toggles the lamp at random intervals up to `max_flicker_wait`
struct Flicker {
    /// Set on the first poll after entering FLICKER
    next_change: Option<f64>,
}

impl Routine<LightHost> for Flicker {
    fn poll(&mut self, host: &mut LightHost, clock: &dyn Clock) {
        let now = clock.now();
        let next_change = *self.next_change.get_or_insert(now);

        if now >= next_change {
            let enabled = !host.lamp.is_enabled();
            host.lamp.set_enabled(enabled);
            self.next_change = Some(next_change + host.rng.sample() * host.max_flicker_wait);
            trace!(enabled, now, "Lamp toggled");
        }
    }
}
