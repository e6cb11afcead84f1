/*!
 * SIGNATURES - Classification des alarmes d'un équipement en catégorie de panne
 *
 * RÔLE : Base de connaissance ordonnée "telle combinaison d'alarmes => tel type
 * de panne". Toutes les signatures sont évaluées ; la meilleure note gagne,
 * l'ordre de déclaration départage les égalités.
 *
 * NOTE :
 * - Correspondance par sous-chaîne, insensible à la casse
 * - note = min(base + 0.02 × nb_alarmes, 1.0)
 * - Aucune signature mais des alarmes => "Unknown/Other" à 0.3
 */

use crate::models::{Alarm, Candidate};
use tracing::debug;

pub const ALARM_COUNT_BONUS: f64 = 0.02;
pub const UNKNOWN_CATEGORY: &str = "Unknown/Other";
pub const UNKNOWN_SCORE: f64 = 0.3;

/// Règle déclarative sur les messages (déjà en minuscules)
#[derive(Debug, Clone)]
pub enum SignatureRule {
    /// Au moins un message contient au moins un des mots-clés
    AnyOf(&'static [&'static str]),
    /// Chaque groupe doit être satisfait par au moins un message
    AllOf(&'static [&'static [&'static str]]),
}

impl SignatureRule {
    pub fn matches(&self, messages: &[String]) -> bool {
        match self {
            SignatureRule::AnyOf(keywords) => any_contains(messages, keywords),
            SignatureRule::AllOf(groups) => groups.iter().all(|kws| any_contains(messages, kws)),
        }
    }
}

fn any_contains(messages: &[String], keywords: &[&str]) -> bool {
    messages.iter().any(|m| keywords.iter().any(|k| m.contains(k)))
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub category: &'static str,
    pub label: &'static str,
    pub rule: SignatureRule,
    pub base_score: f64,
}

impl Signature {
    pub fn score(&self, alarm_count: usize) -> f64 {
        (self.base_score + ALARM_COUNT_BONUS * alarm_count as f64).min(1.0)
    }
}

/// Ordre significatif : départage des égalités
pub fn builtin_signatures() -> Vec<Signature> {
    vec![
        Signature {
            category: "Hardware/Critical_Multi_Fail",
            label: "Compound hardware failure (power + fan)",
            rule: SignatureRule::AllOf(&[&["power supply"], &["fan"]]),
            base_score: 1.0,
        },
        Signature {
            category: "Hardware/Physical",
            label: "Hardware failure (power supply / device)",
            rule: SignatureRule::AnyOf(&["power supply", "device down"]),
            base_score: 0.95,
        },
        Signature {
            category: "Network/Link",
            label: "Physical link / interface failure",
            rule: SignatureRule::AnyOf(&["interface down", "connection lost", "heartbeat loss"]),
            base_score: 0.90,
        },
        Signature {
            category: "Hardware/Fan",
            label: "Cooling fan failure",
            rule: SignatureRule::AnyOf(&["fan fail"]),
            base_score: 0.70,
        },
        Signature {
            category: "Config/Software",
            label: "Misconfiguration / routing protocol failure",
            rule: SignatureRule::AnyOf(&["bgp", "ospf", "config"]),
            base_score: 0.60,
        },
        Signature {
            category: "Resource/Capacity",
            label: "Resource exhaustion (CPU / memory)",
            rule: SignatureRule::AnyOf(&["cpu", "memory", "high"]),
            base_score: 0.50,
        },
    ]
}

#[derive(Debug, Clone)]
pub struct SignatureMatcher {
    signatures: Vec<Signature>,
}

impl Default for SignatureMatcher {
    fn default() -> Self {
        Self::new(builtin_signatures())
    }
}

impl SignatureMatcher {
    pub fn new(signatures: Vec<Signature>) -> Self {
        Self { signatures }
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Meilleure signature et sa note ; égalité => la première déclarée
    pub fn best_match(&self, alarms: &[&Alarm]) -> Option<(&Signature, f64)> {
        let messages: Vec<String> = alarms.iter().map(|a| a.message.to_lowercase()).collect();
        let mut best: Option<(&Signature, f64)> = None;
        for sig in &self.signatures {
            if !sig.rule.matches(&messages) {
                continue;
            }
            let score = sig.score(alarms.len());
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((sig, score));
            }
        }
        best
    }

    /// Candidat pour un équipement ; aucune alarme => aucun candidat
    pub fn classify(&self, device_id: &str, alarms: &[&Alarm]) -> Option<Candidate> {
        if alarms.is_empty() {
            return None;
        }
        let evidence: Vec<String> = alarms.iter().map(|a| a.message.clone()).collect();
        let candidate = match self.best_match(alarms) {
            Some((sig, score)) => Candidate {
                id: device_id.to_string(),
                category: sig.category.to_string(),
                label: sig.label.to_string(),
                probability: score,
                reason: format!("signature {} matched {} alarm(s)", sig.category, alarms.len()),
                evidence,
            },
            None => Candidate {
                id: device_id.to_string(),
                category: UNKNOWN_CATEGORY.to_string(),
                label: "Other anomaly detected".to_string(),
                probability: UNKNOWN_SCORE,
                reason: "no known signature matched".to_string(),
                evidence,
            },
        };
        debug!("[signatures] {} -> {} ({:.2})", device_id, candidate.category, candidate.probability);
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(messages: &[&str]) -> Option<Candidate> {
        let alarms: Vec<Alarm> = messages.iter().map(|m| Alarm::warning("DEV", *m)).collect();
        let refs: Vec<&Alarm> = alarms.iter().collect();
        SignatureMatcher::default().classify("DEV", &refs)
    }

    #[test]
    fn test_compound_power_and_fan_wins() {
        let c = classify(&["Power Supply 1 Failed", "Fan Fail"]).unwrap();
        assert_eq!(c.category, "Hardware/Critical_Multi_Fail");
        assert_eq!(c.probability, 1.0);
        assert_eq!(c.evidence.len(), 2);
    }

    #[test]
    fn test_score_includes_alarm_bonus() {
        let c = classify(&["Heartbeat Loss"]).unwrap();
        assert_eq!(c.category, "Network/Link");
        assert!((c.probability - 0.92).abs() < 1e-9);
    }

    #[test]
    fn test_case_insensitive_match() {
        let c = classify(&["bgp FLAPPING"]).unwrap();
        assert_eq!(c.category, "Config/Software");
    }

    #[test]
    fn test_highest_score_not_first_match() {
        // "memory high" matche Resource ; "device down" matche Hardware/Physical
        let c = classify(&["Memory High", "Device Down"]).unwrap();
        assert_eq!(c.category, "Hardware/Physical");
    }

    #[test]
    fn test_tie_keeps_declaration_order() {
        let matcher = SignatureMatcher::new(vec![
            Signature { category: "First", label: "first", rule: SignatureRule::AnyOf(&["x"]), base_score: 0.5 },
            Signature { category: "Second", label: "second", rule: SignatureRule::AnyOf(&["x"]), base_score: 0.5 },
        ]);
        let alarm = Alarm::warning("D", "x");
        let c = matcher.classify("D", &[&alarm]).unwrap();
        assert_eq!(c.category, "First");
    }

    #[test]
    fn test_unknown_bucket_and_empty() {
        let c = classify(&["Unreachable"]).unwrap();
        assert_eq!(c.category, UNKNOWN_CATEGORY);
        assert_eq!(c.probability, UNKNOWN_SCORE);
        assert!(classify(&[]).is_none());
    }
}
