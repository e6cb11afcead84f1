/*!
 * MODÈLES - Objets valeur échangés par le pipeline d'inférence
 *
 * RÔLE : Alarm (entrée), Candidate (sortie du classement), SafetyJudgment
 * (verdict par équipement). Tous sont créés et jetés dans un seul appel
 * d'analyse, aucune persistance.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Valeur inconnue => WARNING (comportement du validateur d'alarmes)
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "INFO" => Severity::Info,
            _ => Severity::Warning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub device_id: String,
    pub message: String,
    pub severity: Severity,
}

impl Alarm {
    pub fn new(device_id: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            device_id: device_id.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn critical(device_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(device_id, message, Severity::Critical)
    }

    pub fn warning(device_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(device_id, message, Severity::Warning)
    }
}

/// Alarme brute telle que reçue à la frontière (HTTP, fichiers de scénario)
#[derive(Debug, Clone, Deserialize)]
pub struct RawAlarm {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

/// Hypothèse de cause racine, notée 0.0 - 1.0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    #[serde(rename = "type")]
    pub category: String,
    pub label: String,
    #[serde(rename = "prob")]
    pub probability: f64,
    pub reason: String,
    #[serde(rename = "alarms")]
    pub evidence: Vec<String>,
}

pub const NORMAL_STATE_ID: &str = "System";
pub const NORMAL_STATE_CATEGORY: &str = "Normal";

impl Candidate {
    /// Sentinelle "tout va bien" : le classement ne renvoie jamais de liste vide
    pub fn normal_state() -> Self {
        Self {
            id: NORMAL_STATE_ID.to_string(),
            category: NORMAL_STATE_CATEGORY.to_string(),
            label: "Nominal operation".to_string(),
            probability: 0.0,
            reason: "No alarm attributed to any known device".to_string(),
            evidence: Vec::new(),
        }
    }

    pub fn is_normal_state(&self) -> bool {
        self.id == NORMAL_STATE_ID && self.category == NORMAL_STATE_CATEGORY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Normal,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Insensible à la casse, accepte GREEN/YELLOW/RED
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NORMAL" | "GREEN" => Some(HealthStatus::Normal),
            "WARNING" | "YELLOW" => Some(HealthStatus::Warning),
            "CRITICAL" | "RED" => Some(HealthStatus::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactType {
    None,
    Degraded,
    RedundancyLost,
    Outage,
    Unknown,
}

impl ImpactType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NONE" => Some(ImpactType::None),
            "DEGRADED" => Some(ImpactType::Degraded),
            "REDUNDANCY_LOST" => Some(ImpactType::RedundancyLost),
            "OUTAGE" => Some(ImpactType::Outage),
            "UNKNOWN" => Some(ImpactType::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyJudgment {
    pub status: HealthStatus,
    pub impact_type: ImpactType,
    pub reason: String,
    /// true = règle déterministe, false = estimation (IA ou défaut)
    pub is_definitive: bool,
}

pub const MANUAL_ANALYSIS_REQUIRED: &str = "manual analysis required";

impl SafetyJudgment {
    pub fn definitive(status: HealthStatus, impact_type: ImpactType, reason: impl Into<String>) -> Self {
        Self {
            status,
            impact_type,
            reason: reason.into(),
            is_definitive: true,
        }
    }

    /// Repli obligatoire quand l'oracle IA échoue
    pub fn manual_analysis_required() -> Self {
        Self {
            status: HealthStatus::Warning,
            impact_type: ImpactType::Unknown,
            reason: MANUAL_ANALYSIS_REQUIRED.to_string(),
            is_definitive: false,
        }
    }

    /// Aucune règle et aucun oracle configuré
    pub fn insufficient_information() -> Self {
        Self {
            status: HealthStatus::Warning,
            impact_type: ImpactType::Unknown,
            reason: "Insufficient information for definitive judgment".to_string(),
            is_definitive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JudgmentSource {
    SafetyRule,
    Oracle,
    /// oracle consulté mais en échec => repli "manual analysis required"
    OracleFallback,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceJudgment {
    pub device_id: String,
    pub source: JudgmentSource,
    #[serde(flatten)]
    pub judgment: SafetyJudgment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_lenient_parse() {
        assert_eq!(Severity::parse_lenient("critical"), Severity::Critical);
        assert_eq!(Severity::parse_lenient(" Info "), Severity::Info);
        assert_eq!(Severity::parse_lenient("MAJOR"), Severity::Warning);
    }

    #[test]
    fn test_health_status_synonyms() {
        assert_eq!(HealthStatus::parse("red"), Some(HealthStatus::Critical));
        assert_eq!(HealthStatus::parse("Yellow"), Some(HealthStatus::Warning));
        assert_eq!(HealthStatus::parse("GREEN"), Some(HealthStatus::Normal));
        assert_eq!(HealthStatus::parse("orange"), None);
    }

    #[test]
    fn test_candidate_wire_names() {
        let json = serde_json::to_value(Candidate::normal_state()).unwrap();
        assert_eq!(json["id"], "System");
        assert_eq!(json["type"], "Normal");
        assert_eq!(json["prob"], 0.0);
        assert!(json["alarms"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_impact_type_serde() {
        let json = serde_json::to_string(&ImpactType::RedundancyLost).unwrap();
        assert_eq!(json, "\"REDUNDANCY_LOST\"");
        assert_eq!(ImpactType::parse("redundancy_lost"), Some(ImpactType::RedundancyLost));
    }

    #[test]
    fn test_judgment_source_wire_names() {
        let json = serde_json::to_string(&JudgmentSource::OracleFallback).unwrap();
        assert_eq!(json, "\"ORACLE_FALLBACK\"");
        let back: JudgmentSource = serde_json::from_str("\"SAFETY_RULE\"").unwrap();
        assert_eq!(back, JudgmentSource::SafetyRule);
    }
}
