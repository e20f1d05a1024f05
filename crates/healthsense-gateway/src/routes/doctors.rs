//! `/api/doctors*` and `/api/appointments`: doctor search, slots and booking

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{agent_payload, confirmation_id, present};
use crate::error::{ApiError, require};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::server::GatewayState;

const SERVICE: &str = "Doctor";

pub const SPECIALTIES: [&str; 10] = [
    "Cardiology",
    "Neurology",
    "Orthopedics",
    "Pediatrics",
    "Dermatology",
    "Psychiatry",
    "Internal Medicine",
    "General Surgery",
    "Oncology",
    "Radiology",
];

/// Only `specialty` narrows the search; the rest are accepted and logged
#[derive(Debug, Deserialize)]
pub struct DoctorQuery {
    pub search: Option<String>,
    pub specialty: Option<String>,
    pub location: Option<String>,
    pub available: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DoctorResponse {
    pub success: bool,
    pub doctors: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn list_handler(
    State(state): State<GatewayState>,
    ApiQuery(query): ApiQuery<DoctorQuery>,
) -> Result<Json<DoctorResponse>, ApiError> {
    let agent = require(&state.agents.doctor, SERVICE)?;
    debug!(
        "Doctor search (search={:?}, location={:?}, available={:?})",
        query.search, query.location, query.available
    );

    let result = agent.get_available_doctors(present(&query.specialty)).await;
    let (message, error) = if result.success {
        (Some(result.text_or("No doctors found").to_string()), None)
    } else {
        (None, Some(result.text_or("Failed to fetch doctors").to_string()))
    };
    Ok(Json(DoctorResponse {
        success: result.success,
        doctors: Vec::new(),
        message,
        error,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

/// Lists every open slot; the doctor id and date only show up in the log
pub async fn slots_handler(
    State(state): State<GatewayState>,
    ApiPath(doctor_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<SlotsQuery>,
) -> Result<Json<Value>, ApiError> {
    let agent = require(&state.agents.doctor, SERVICE)?;
    debug!("Slots requested for doctor {} on {:?}", doctor_id, query.date);

    let result = agent.get_available_slots(None).await;
    Ok(Json(Value::Object(agent_payload(
        &result,
        "slots",
        "No slots available",
        "Failed to fetch slots",
    ))))
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentRequest {
    #[serde(default)]
    pub doctor_id: Option<i64>,
    #[serde(default)]
    pub doctor_name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub patient_email: String,
    #[serde(default)]
    pub patient_phone: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl AppointmentRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.doctor_name.trim().is_empty() {
            return Err(ApiError::bad_request("Doctor name is required"));
        }
        if self.date.trim().is_empty() || self.time.trim().is_empty() {
            return Err(ApiError::bad_request("Date and time are required"));
        }
        if self.patient_name.trim().is_empty() || self.patient_email.trim().is_empty() {
            return Err(ApiError::bad_request("Patient name and email are required"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_id: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn appointment_handler(
    State(state): State<GatewayState>,
    ApiJson(request): ApiJson<AppointmentRequest>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let agent = require(&state.agents.doctor, SERVICE)?;
    request.validate()?;

    let result = agent
        .book_appointment(&request.doctor_name, &request.time)
        .await;
    if !result.success {
        return Ok(Json(AppointmentResponse {
            success: false,
            confirmation_id: None,
            message: "Failed to book appointment".to_string(),
            error: Some(result.text_or("Unknown error occurred").to_string()),
        }));
    }

    let confirmation = confirmation_id("APT");
    info!(
        "Booked appointment {} with Dr. {} on {} at {}",
        confirmation, request.doctor_name, request.date, request.time
    );
    Ok(Json(AppointmentResponse {
        success: true,
        confirmation_id: Some(confirmation),
        message: format!(
            "Appointment booked successfully with {}",
            request.doctor_name
        ),
        error: None,
    }))
}

pub async fn specialties_handler() -> Json<Value> {
    Json(json!({
        "success": true,
        "specialties": SPECIALTIES,
    }))
}
