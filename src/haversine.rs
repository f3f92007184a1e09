//! Haversine travel-time estimate (fallback when no routed table is available).
//!
//! Uses great-circle distance to estimate travel time.
//! Less accurate than OSRM (ignores roads) but always available.

use crate::error::PlannerError;
use crate::traits::{Site, TravelTimeSource};
use crate::travel::TravelTimeTable;

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Estimates travel time using straight-line distance and an assumed speed.
#[derive(Debug, Clone)]
pub struct HaversineTravelTimes {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineTravelTimes {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineTravelTimes {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Calculate haversine distance between two points in kilometers.
    fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    fn km_to_seconds(&self, km: f64) -> f64 {
        (km / self.speed_kmh * 3600.0).round()
    }
}

impl TravelTimeSource for HaversineTravelTimes {
    fn table_for(&self, sites: &[Site]) -> Result<TravelTimeTable, PlannerError> {
        if !(self.speed_kmh > 0.0) {
            return Err(PlannerError::invalid(format!(
                "haversine speed must be positive, got {}",
                self.speed_kmh
            )));
        }

        let mut table = TravelTimeTable::new();
        for from in sites {
            for to in sites {
                let seconds = if from.name == to.name {
                    0.0
                } else {
                    self.km_to_seconds(Self::haversine_km(from.coords(), to.coords()))
                };
                table.insert(&from.name, &to.name, seconds);
            }
        }
        Ok(table)
    }
}
