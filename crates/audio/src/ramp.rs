//! Zeitgesteuerte Parameter-Automation
//!
//! Ein Parameter (Cutoff, Gain, Pan, Playback-Rate) aendert sich nie
//! sprunghaft sondern folgt geplanten Ereignissen:
//! - `set_value_at`: Sprung zum Zeitpunkt
//! - `set_target_at`: exponentielle Annaeherung `v(t) = z + (v0 - z) * e^(-(t - t0) / tau)`
//! - `exponential_ramp_to`: geometrische Interpolation bis zu einem Endzeitpunkt
//!
//! Neue Ziele vor Ende einer laufenden Annaeherung blenden vom aktuellen
//! Wert aus weiter. Das gleiche Ziel zweimal zu setzen aendert den
//! Endwert nicht.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    SetValue {
        time: f64,
        value: f32,
    },
    SetTarget {
        time: f64,
        target: f32,
        time_constant: f64,
    },
    ExponentialRamp {
        time: f64,
        end_time: f64,
        value: f32,
    },
}

impl Automation {
    fn start(&self) -> f64 {
        match *self {
            Automation::SetValue { time, .. }
            | Automation::SetTarget { time, .. }
            | Automation::ExponentialRamp { time, .. } => time,
        }
    }

    /// Wert zum Zeitpunkt `t`, ausgehend von `v0` beim Start des Ereignisses
    fn evaluate(&self, v0: f32, t: f64) -> f32 {
        match *self {
            Automation::SetValue { value, .. } => value,
            Automation::SetTarget {
                time,
                target,
                time_constant,
            } => {
                if time_constant <= 0.0 {
                    return target;
                }
                let k = (-(t - time) / time_constant).exp() as f32;
                target + (v0 - target) * k
            }
            Automation::ExponentialRamp {
                time,
                end_time,
                value,
            } => {
                if t >= end_time || end_time <= time {
                    return value;
                }
                // Vorzeichenwechsel oder 0: Wert halten bis zum Ende
                if v0 * value <= 0.0 {
                    return v0;
                }
                let frac = ((t - time) / (end_time - time)) as f32;
                v0 * (value / v0).powf(frac)
            }
        }
    }
}

/// Automations-Zeitleiste eines einzelnen Parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTimeline {
    initial: f32,
    events: Vec<Automation>,
}

impl ParamTimeline {
    pub fn new(value: f32) -> Self {
        Self {
            initial: value,
            events: Vec::new(),
        }
    }

    pub fn set_value_at(&mut self, value: f32, time: f64) {
        self.insert(Automation::SetValue { time, value });
    }

    pub fn set_target_at(&mut self, target: f32, time: f64, time_constant: f64) {
        self.insert(Automation::SetTarget {
            time,
            target,
            time_constant,
        });
    }

    /// Startet beim Aufrufzeitpunkt `time`, erreicht `value` bei `end_time`
    pub fn exponential_ramp_to(&mut self, value: f32, time: f64, end_time: f64) {
        self.insert(Automation::ExponentialRamp {
            time,
            end_time,
            value,
        });
    }

    /// Wert zum Zeitpunkt `t`
    pub fn value_at(&self, t: f64) -> f32 {
        let mut v = self.initial;
        for (i, event) in self.events.iter().enumerate() {
            if event.start() > t {
                break;
            }
            let segment_end = self
                .events
                .get(i + 1)
                .map(Automation::start)
                .filter(|s| *s <= t)
                .unwrap_or(t);
            v = event.evaluate(v, segment_end);
        }
        v
    }

    /// Wert, gegen den die Zeitleiste langfristig laeuft
    pub fn final_target(&self) -> f32 {
        match self.events.last() {
            None => self.initial,
            Some(Automation::SetValue { value, .. }) => *value,
            Some(Automation::SetTarget { target, .. }) => *target,
            Some(Automation::ExponentialRamp { value, .. }) => *value,
        }
    }

    /// Anzahl geplanter Ereignisse
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    fn insert(&mut self, event: Automation) {
        let start = event.start();
        self.compact(start);
        let pos = self
            .events
            .iter()
            .position(|e| e.start() > start)
            .unwrap_or(self.events.len());
        self.events.insert(pos, event);
    }

    /// Fasst alle Ereignisse vor dem letzten bereits begonnenen zu einem
    /// Startwert zusammen. Haelt die Zeitleiste bei langen Sitzungen klein.
    fn compact(&mut self, now: f64) {
        let Some(last_started) = self.events.iter().rposition(|e| e.start() <= now) else {
            return;
        };
        if last_started == 0 {
            return;
        }
        let anchor = self.events[last_started].start();
        let mut v = self.initial;
        for (i, event) in self.events[..last_started].iter().enumerate() {
            let segment_end = self.events[i + 1].start().min(anchor);
            v = event.evaluate(v, segment_end);
        }
        self.initial = v;
        self.events.drain(..last_started);
    }
}
