/*!
 * RANKER - Fusion et tri final des candidats
 *
 * - un seul candidat par équipement (probabilité max, preuves fusionnées)
 * - tri décroissant stable : à égalité, l'ordre d'arrivée est conservé
 * - liste vide => sentinelle "état normal"
 */

use crate::models::Candidate;
use indexmap::IndexMap;

/// Fusionne les doublons par id, dans l'ordre de première apparition
pub fn merge_by_device(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut merged: IndexMap<String, Candidate> = IndexMap::new();
    for candidate in candidates {
        match merged.get_mut(&candidate.id) {
            Some(existing) => {
                for item in candidate.evidence {
                    if !existing.evidence.contains(&item) {
                        existing.evidence.push(item);
                    }
                }
                if candidate.probability > existing.probability {
                    existing.probability = candidate.probability;
                    existing.category = candidate.category;
                    existing.label = candidate.label;
                    existing.reason = candidate.reason;
                }
            }
            None => {
                merged.insert(candidate.id.clone(), candidate);
            }
        }
    }
    merged.into_values().collect()
}

pub fn rank(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut ranked = merge_by_device(candidates);
    if ranked.is_empty() {
        return vec![Candidate::normal_state()];
    }
    // sort_by est stable
    ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(id: &str, prob: f64, evidence: &[&str]) -> Candidate {
        Candidate {
            id: id.into(),
            category: "Test".into(),
            label: format!("label {}", prob),
            probability: prob,
            reason: String::new(),
            evidence: evidence.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_empty_yields_normal_state() {
        let ranked = rank(Vec::new());
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].is_normal_state());
        assert_eq!(ranked[0].probability, 0.0);
    }

    #[test]
    fn test_sorted_descending_and_stable() {
        let ranked = rank(vec![cand("A", 0.5, &[]), cand("B", 0.9, &[]), cand("C", 0.5, &[])]);
        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_duplicates_are_merged() {
        let ranked = rank(vec![cand("A", 0.5, &["x"]), cand("A", 0.9, &["x", "y"])]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].probability, 0.9);
        assert_eq!(ranked[0].evidence, vec!["x".to_string(), "y".to_string()]);
    }
}
