//! Append-only incident records surfaced to the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    RiskViolation,
    ExecutionError,
    CredentialChange,
    EmergencyStop,
}

impl IncidentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentKind::RiskViolation => "risk_violation",
            IncidentKind::ExecutionError => "execution_error",
            IncidentKind::CredentialChange => "credential_change",
            IncidentKind::EmergencyStop => "emergency_stop",
        }
    }
}

impl FromStr for IncidentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "risk_violation" => Ok(IncidentKind::RiskViolation),
            "execution_error" => Ok(IncidentKind::ExecutionError),
            "credential_change" => Ok(IncidentKind::CredentialChange),
            "emergency_stop" => Ok(IncidentKind::EmergencyStop),
            other => Err(Error::Validation(format!("unknown incident kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSeverity {
    Info,
    Warning,
    Danger,
}

impl IncidentSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentSeverity::Info => "info",
            IncidentSeverity::Warning => "warning",
            IncidentSeverity::Danger => "danger",
        }
    }
}

impl FromStr for IncidentSeverity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(IncidentSeverity::Info),
            "warning" => Ok(IncidentSeverity::Warning),
            "danger" => Ok(IncidentSeverity::Danger),
            other => Err(Error::Validation(format!(
                "unknown incident severity '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Incident {
    pub id: Uuid,
    pub model_id: Uuid,
    pub kind: IncidentKind,
    pub severity: IncidentSeverity,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        for kind in [
            IncidentKind::RiskViolation,
            IncidentKind::ExecutionError,
            IncidentKind::CredentialChange,
            IncidentKind::EmergencyStop,
        ] {
            assert_eq!(kind.as_str().parse::<IncidentKind>().unwrap(), kind);
        }
    }

    #[test]
    fn severity_round_trip() {
        for severity in [
            IncidentSeverity::Info,
            IncidentSeverity::Warning,
            IncidentSeverity::Danger,
        ] {
            assert_eq!(
                severity.as_str().parse::<IncidentSeverity>().unwrap(),
                severity
            );
        }
    }
}
