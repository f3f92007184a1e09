//! OSRM HTTP adapter for travel-time tables.

use serde::Deserialize;

use crate::error::PlannerError;
use crate::traits::{Site, TravelTimeSource};
use crate::travel::TravelTimeTable;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, PlannerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, sites: &[Site]) -> String {
        let coords = sites
            .iter()
            .map(|site| format!("{:.6},{:.6}", site.lng, site.lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=duration",
            self.config.base_url, self.config.profile, coords
        )
    }
}

impl TravelTimeSource for OsrmClient {
    fn table_for(&self, sites: &[Site]) -> Result<TravelTimeTable, PlannerError> {
        if sites.is_empty() {
            return Ok(TravelTimeTable::new());
        }

        let body = self
            .client
            .get(self.table_url(sites))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())?;

        let table = table_from_response(sites, body)?;
        tracing::debug!(sites = sites.len(), edges = table.len(), "fetched OSRM table");
        Ok(table)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: Option<String>,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

/// Unroutable pairs come back as `null` and stay missing in the table.
fn table_from_response(sites: &[Site], body: OsrmTableResponse) -> Result<TravelTimeTable, PlannerError> {
    if let Some(code) = body.code.as_deref().filter(|code| *code != "Ok") {
        return Err(PlannerError::TravelSource(format!("OSRM table request failed with code {code}")));
    }

    let destinations: Vec<String> = sites.iter().map(|site| site.name.clone()).collect();
    let rows = body.durations.unwrap_or_default();
    Ok(TravelTimeTable::from_rows(
        &destinations,
        destinations.iter().cloned().zip(rows),
    ))
}
