//! `/api/hospitals*`: search, compare and filter by specialty

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::{format_number, present};
use crate::error::{ApiError, require};
use crate::extract::ApiQuery;
use crate::server::GatewayState;

const SERVICE: &str = "Hospital";

#[derive(Debug, Default, Deserialize)]
pub struct HospitalQuery {
    pub search: Option<String>,
    pub specialty: Option<String>,
    pub rating: Option<String>,
    pub beds: Option<String>,
    pub location: Option<String>,
}

impl HospitalQuery {
    /// Natural-language request built from whichever filters are set
    pub fn to_prompt(&self) -> Result<String, ApiError> {
        let mut parts = Vec::new();
        if let Some(search) = present(&self.search) {
            parts.push(format!("hospitals named '{}'", search));
        }
        if let Some(specialty) = present(&self.specialty) {
            parts.push(format!("specialized in {}", specialty));
        }
        if let Some(location) = present(&self.location) {
            parts.push(format!("located in {}", location));
        }
        if let Some(raw) = present(&self.rating) {
            let rating: f64 = raw
                .parse()
                .map_err(|_| ApiError::bad_request(format!("Invalid rating '{}'", raw)))?;
            if rating > 0.0 {
                parts.push(format!("with rating above {}", format_number(rating)));
            }
        }
        if let Some(beds) = present(&self.beds) {
            parts.push(format!("with {} beds", beds));
        }

        if parts.is_empty() {
            Ok("Show me all hospitals".to_string())
        } else {
            Ok(format!("Find {}", parts.join(" ")))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HospitalResponse {
    pub success: bool,
    pub hospitals: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn list_handler(
    State(state): State<GatewayState>,
    ApiQuery(query): ApiQuery<HospitalQuery>,
) -> Result<Json<HospitalResponse>, ApiError> {
    let agent = require(&state.agents.hospital, SERVICE)?;
    let prompt = query.to_prompt()?;
    debug!("Hospital search: {}", prompt);

    let result = agent.compare_hospitals(&prompt).await;
    let (message, error) = if result.success {
        (Some(result.text_or("No hospitals found").to_string()), None)
    } else {
        (None, Some(result.text_or("Failed to fetch hospitals").to_string()))
    };
    Ok(Json(HospitalResponse {
        success: result.success,
        hospitals: Vec::new(),
        message,
        error,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    #[serde(default)]
    pub hospital_ids: String,
}

pub async fn compare_handler(
    State(state): State<GatewayState>,
    ApiQuery(query): ApiQuery<CompareQuery>,
) -> Result<Json<Value>, ApiError> {
    let agent = require(&state.agents.hospital, SERVICE)?;
    let names: Vec<&str> = query
        .hospital_ids
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();
    if names.len() < 2 {
        return Err(ApiError::bad_request(
            "At least 2 hospitals required for comparison",
        ));
    }

    let result = agent
        .compare_hospitals(&format!("Compare these hospitals: {}", names.join(", ")))
        .await;
    if result.success {
        Ok(Json(json!({
            "success": true,
            "comparison": result.text_or("No comparison available"),
        })))
    } else {
        Ok(Json(json!({
            "success": false,
            "error": result.text_or("Failed to compare hospitals"),
        })))
    }
}

#[derive(Debug, Deserialize)]
pub struct SpecialtyQuery {
    pub specialty: Option<String>,
}

pub async fn specialty_handler(
    State(state): State<GatewayState>,
    ApiQuery(query): ApiQuery<SpecialtyQuery>,
) -> Result<Json<Value>, ApiError> {
    let agent = require(&state.agents.hospital, SERVICE)?;
    let specialty =
        present(&query.specialty).ok_or_else(|| ApiError::bad_request("Specialty is required"))?;

    let result = agent
        .compare_hospitals(&format!("Find hospitals with {} specialty", specialty))
        .await;
    if result.success {
        Ok(Json(json!({
            "success": true,
            "specialty": specialty,
            "hospitals": result.text_or("No hospitals found"),
        })))
    } else {
        Ok(Json(json!({
            "success": false,
            "specialty": specialty,
            "error": result.text_or("Failed to fetch hospitals"),
        })))
    }
}
