//! Path-loss to signal-level mapping on the amateur S-unit scale.

use crate::core::polar::InterpolatedField;
use serde::{Deserialize, Serialize};

/// Transmit/receive link parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkBudget {
    pub tx_power_watts: f64,
    pub tx_gain_db: f64,
    pub rx_gain_db: f64,
}

impl LinkBudget {
    /// Transmit power in dBm.
    pub fn tx_power_dbm(&self) -> f64 {
        10.0 * self.tx_power_watts.log10() + 30.0
    }

    /// Received power for a given path loss.
    pub fn received_dbm(&self, loss_db: f64) -> f64 {
        self.tx_power_dbm() - loss_db + self.tx_gain_db + self.rx_gain_db
    }
}

/// S1/S9 reference levels of the S-unit scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalScale {
    pub s1_dbm: f64,
    pub s9_dbm: f64,
}

impl Default for SignalScale {
    fn default() -> Self {
        Self {
            s1_dbm: -121.0,
            s9_dbm: -73.0,
        }
    }
}

impl SignalScale {
    /// dB per S-unit: eight units span S1 to S9.
    pub fn db_per_unit(&self) -> f64 {
        (self.s9_dbm - self.s1_dbm) / 8.0
    }

    /// Continuous signal-quality value: S-units above S1 (0 at S1, 8 at
    /// S9, unbounded above). Strictly decreasing in path loss.
    pub fn s_value(&self, received_dbm: f64) -> f64 {
        (received_dbm - self.s1_dbm) / self.db_per_unit()
    }

    /// Conventional S-meter readout, capped at S9 plus dB-over.
    pub fn s_unit(&self, received_dbm: f64) -> SUnit {
        if received_dbm >= self.s9_dbm {
            return SUnit {
                full_units: 9,
                db_over: received_dbm - self.s9_dbm,
            };
        }
        let step = self.db_per_unit();
        let full_units = 1 + ((received_dbm - self.s1_dbm) / step) as i32;
        SUnit {
            full_units,
            db_over: received_dbm - (self.s1_dbm + (full_units - 1) as f64 * step),
        }
    }
}

/// Discrete S-meter reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SUnit {
    pub full_units: i32,
    pub db_over: f64,
}

impl std::fmt::Display for SUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.full_units >= 9 && self.db_over >= 0.5 {
            write!(f, "S9+{:.0}", self.db_over)
        } else {
            write!(f, "S{}", self.full_units)
        }
    }
}

/// Map an interpolated loss field to continuous S-unit values.
/// Undefined (NaN) nodes stay undefined; they are never treated as
/// zero-loss cells.
pub fn loss_to_s_values(
    field: &InterpolatedField,
    link: &LinkBudget,
    scale: &SignalScale,
) -> InterpolatedField {
    log::debug!(
        "mapping loss field to S-units (tx {:.1} dBm, gains {:+.1}/{:+.1} dB)",
        link.tx_power_dbm(),
        link.tx_gain_db,
        link.rx_gain_db
    );
    field.map_values(|loss| scale.s_value(link.received_dbm(loss)))
}
