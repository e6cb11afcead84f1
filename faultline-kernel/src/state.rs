use crate::service::Diagnosis;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

pub const RECENT_DIAGNOSES_CAPACITY: usize = 32;

/// Derniers diagnostics en mémoire (GET /diagnoses/recent), plus récent en tête
#[derive(Clone)]
pub struct RecentDiagnoses {
    inner: Shared<VecDeque<Diagnosis>>,
    capacity: usize,
}

impl Default for RecentDiagnoses {
    fn default() -> Self {
        Self::with_capacity(RECENT_DIAGNOSES_CAPACITY)
    }
}

impl RecentDiagnoses {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: new_state(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, diagnosis: Diagnosis) {
        let mut log = self.inner.lock();
        log.push_front(diagnosis);
        log.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<Diagnosis> {
        self.inner.lock().front().cloned()
    }

    pub fn snapshot(&self) -> Vec<Diagnosis> {
        self.inner.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candidate;
    use crate::service::ScopeHealth;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn diagnosis() -> Diagnosis {
        Diagnosis {
            analysis_id: Uuid::new_v4(),
            generated_at: OffsetDateTime::now_utc(),
            alarm_count: 0,
            scope_health: ScopeHealth::Good,
            candidates: vec![Candidate::normal_state()],
            judgments: Vec::new(),
        }
    }

    #[test]
    fn test_bounded_newest_first() {
        let recent = RecentDiagnoses::with_capacity(2);
        let a = diagnosis();
        let b = diagnosis();
        let c = diagnosis();
        recent.push(a);
        recent.push(b.clone());
        recent.push(c.clone());
        assert_eq!(recent.len(), 2);
        let ids: Vec<Uuid> = recent.snapshot().iter().map(|d| d.analysis_id).collect();
        assert_eq!(ids, vec![c.analysis_id, b.analysis_id]);
    }
}
