use rand::{Rng, RngCore};

use crate::core::measurement::{Measurement, MeasurementSource, Stimulus};
use crate::core::model::NamedValue;

/// Simulated power measurement, `P = I * V`, with random current and voltage loss.
pub struct PowerSupplySimulator {
    max_loss: f64,
}

impl PowerSupplySimulator {
    /// Default simulator, losing up to 25% of current and of voltage independently.
    pub fn new() -> Self {
        Self { max_loss: 0.25 }
    }

    /// A lossless simulator.
    pub fn ideal() -> Self {
        Self { max_loss: 0.0 }
    }

    /// Simulator with a custom maximum loss fraction, clamped to `[0, 1]`.
    pub fn with_max_loss(max_loss: f64) -> Self {
        Self { max_loss: max_loss.clamp(0.0, 1.0) }
    }

    fn loss_factor(&self, rng: &mut dyn RngCore) -> f64 {
        1.0 - rng.gen::<f64>() * self.max_loss
    }
}

impl Default for PowerSupplySimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementSource for PowerSupplySimulator {
    fn name(&self) -> &'static str {
        "power_supply"
    }

    fn measure(&self, stimulus: &Stimulus, rng: &mut dyn RngCore) -> Measurement {
        let current_loss = self.loss_factor(rng);
        let voltage_loss = self.loss_factor(rng);
        let power = stimulus.current * current_loss * stimulus.voltage * voltage_loss;

        Measurement {
            value: power,
            inputs: vec![
                NamedValue::new("current", stimulus.current),
                NamedValue::new("voltage", stimulus.voltage),
            ],
            outputs: vec![NamedValue::new("power", power)],
        }
    }
}
