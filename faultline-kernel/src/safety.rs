/*!
 * SAFETY RULES - Règles déterministes prioritaires sur tout jugement IA
 *
 * RÔLE : Évaluées AVANT toute délégation à l'oracle, dans un ordre fixe,
 * la première règle qui matche gagne :
 *   1. mots-clés d'arrêt (dual loss, device down...)   => CRITICAL/OUTAGE
 *   2. redondance PSU (psu_count >= 2 => WARNING)
 *   3. redondance HA (groupe partiellement / totalement tombé)
 *   4. thermique (fan + surchauffe => CRITICAL, fan seul => WARNING)
 *   5. mémoire (mémoire + OOM => CRITICAL, mémoire seule => WARNING)
 * Aucune règle => None, l'appelant délègue à l'IA ou retombe sur un défaut.
 *
 * La redondance (PSU/HA) ne fait que rétrograder la sévérité, jamais l'inverse.
 */

use crate::models::{HealthStatus, ImpactType, SafetyJudgment};

pub const OUTAGE_KEYWORDS: &[&str] = &[
    "device down",
    "dual loss",
    "dual psu loss",
    "both psu",
    "thermal shutdown",
    "system shutdown",
    "complete failure",
    "total loss",
    "両系",
    "全停止",
    "デバイスダウン",
];

pub const PSU_FAILURE_KEYWORDS: &[&str] = &["power supply", "psu fail", "psu 1 fail", "電源障害"];
pub const FAN_FAILURE_KEYWORDS: &[&str] = &["fan fail", "fan fault", "ファン故障"];
pub const THERMAL_KEYWORDS: &[&str] = &["high temperature", "overheat", "thermal", "高温"];
pub const MEMORY_KEYWORDS: &[&str] = &["memory high", "memory leak", "メモリリーク", "メモリ高"];
pub const OOM_KEYWORDS: &[&str] = &["out of memory", "oom", "kernel panic", "process killed"];

/// État d'un groupe HA au moment de l'analyse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundancyState {
    pub group: String,
    pub total_members: usize,
    pub failed_members: usize,
}

/// Entrées issues de la topologie pour un équipement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyContext {
    pub psu_count: u64,
    pub redundancy: Option<RedundancyState>,
}

impl Default for SafetyContext {
    fn default() -> Self {
        Self { psu_count: 1, redundancy: None }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyRuleEngine;

fn joined_lower(alarms: &[&str]) -> String {
    alarms.join(" ").to_lowercase()
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

impl SafetyRuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Arrêt de service explicite ; ne doit jamais être contredit par l'IA
    pub fn check_outage(&self, alarms: &[&str]) -> Option<SafetyJudgment> {
        let joined = joined_lower(alarms);
        OUTAGE_KEYWORDS.iter().find(|k| joined.contains(*k)).map(|keyword| {
            SafetyJudgment::definitive(
                HealthStatus::Critical,
                ImpactType::Outage,
                format!("Service outage detected: '{}' (safety rule)", keyword),
            )
        })
    }

    /// Panne PSU simple ; la double perte est déjà traitée par check_outage
    pub fn check_psu_redundancy(&self, alarms: &[&str], psu_count: u64) -> Option<SafetyJudgment> {
        let joined = joined_lower(alarms);
        if !contains_any(&joined, PSU_FAILURE_KEYWORDS) {
            return None;
        }
        if psu_count >= 2 {
            Some(SafetyJudgment::definitive(
                HealthStatus::Warning,
                ImpactType::RedundancyLost,
                format!("Single PSU failure with redundancy (psu_count={}) (safety rule)", psu_count),
            ))
        } else {
            Some(SafetyJudgment::definitive(
                HealthStatus::Critical,
                ImpactType::Outage,
                format!("Single PSU failure without redundancy (psu_count={}) (safety rule)", psu_count),
            ))
        }
    }

    pub fn check_ha_redundancy(&self, redundancy: Option<&RedundancyState>) -> Option<SafetyJudgment> {
        let state = redundancy?;
        if state.failed_members == 0 {
            return None;
        }
        if state.failed_members >= state.total_members {
            Some(SafetyJudgment::definitive(
                HealthStatus::Critical,
                ImpactType::Outage,
                format!(
                    "HA group {} total failure: {}/{} (safety rule)",
                    state.group, state.failed_members, state.total_members
                ),
            ))
        } else {
            Some(SafetyJudgment::definitive(
                HealthStatus::Warning,
                ImpactType::RedundancyLost,
                format!(
                    "HA group {} partial failure: {}/{} (safety rule)",
                    state.group, state.failed_members, state.total_members
                ),
            ))
        }
    }

    pub fn check_thermal_risk(&self, alarms: &[&str]) -> Option<SafetyJudgment> {
        let joined = joined_lower(alarms);
        if !contains_any(&joined, FAN_FAILURE_KEYWORDS) {
            return None;
        }
        if contains_any(&joined, THERMAL_KEYWORDS) {
            Some(SafetyJudgment::definitive(
                HealthStatus::Critical,
                ImpactType::Outage,
                "Fan failure with thermal escalation (safety rule)",
            ))
        } else {
            Some(SafetyJudgment::definitive(
                HealthStatus::Warning,
                ImpactType::Degraded,
                "Fan failure detected, thermal escalation risk (safety rule)",
            ))
        }
    }

    pub fn check_memory_risk(&self, alarms: &[&str]) -> Option<SafetyJudgment> {
        let joined = joined_lower(alarms);
        if !contains_any(&joined, MEMORY_KEYWORDS) {
            return None;
        }
        if contains_any(&joined, OOM_KEYWORDS) {
            Some(SafetyJudgment::definitive(
                HealthStatus::Critical,
                ImpactType::Outage,
                "Memory exhaustion causing system instability (safety rule)",
            ))
        } else {
            Some(SafetyJudgment::definitive(
                HealthStatus::Warning,
                ImpactType::Degraded,
                "Memory high, risk of OOM (safety rule)",
            ))
        }
    }

    /// Évaluation ordonnée, court-circuit sur la première règle
    pub fn evaluate(&self, alarms: &[&str], ctx: &SafetyContext) -> Option<SafetyJudgment> {
        if alarms.is_empty() {
            return None;
        }
        self.check_outage(alarms)
            .or_else(|| self.check_psu_redundancy(alarms, ctx.psu_count))
            .or_else(|| self.check_ha_redundancy(ctx.redundancy.as_ref()))
            .or_else(|| self.check_thermal_risk(alarms))
            .or_else(|| self.check_memory_risk(alarms))
    }
}
