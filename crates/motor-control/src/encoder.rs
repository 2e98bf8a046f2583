use crate::{PulseCounter, WheelGeometry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Wheel encoder: converts pulses counted since the start of a motion into
/// travelled distance.
pub struct Encoder {
    counter: Arc<dyn PulseCounter>,
    distance_per_pulse: f64,
    tracking_origin: AtomicU64,
}

impl Encoder {
    pub fn new(counter: Arc<dyn PulseCounter>, geometry: WheelGeometry) -> Self {
        let origin = counter.pulses();
        Self {
            counter,
            distance_per_pulse: geometry.distance_per_pulse(),
            tracking_origin: AtomicU64::new(origin),
        }
    }

    /// Total pulses seen since the counter started
    pub fn pulses(&self) -> u64 {
        self.counter.pulses()
    }

    /// Snapshot the current count as the origin of a new motion.
    pub fn begin_tracking(&self) -> u64 {
        let origin = self.counter.pulses();
        self.tracking_origin.store(origin, Ordering::SeqCst);
        origin
    }

    pub fn tracking_origin(&self) -> u64 {
        self.tracking_origin.load(Ordering::SeqCst)
    }

    /// Pulses counted since the last [`Encoder::begin_tracking`]
    pub fn tracked_pulses(&self) -> u64 {
        self.pulses().saturating_sub(self.tracking_origin())
    }

    /// Distance in meters travelled since the last [`Encoder::begin_tracking`]
    pub fn travelled(&self) -> f64 {
        self.tracked_pulses() as f64 * self.distance_per_pulse
    }

    pub fn distance_per_pulse(&self) -> f64 {
        self.distance_per_pulse
    }
}
