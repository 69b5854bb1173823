//! In-memory implementation of both persistence ports.
//!
//! Used by tests and by `serve --in-memory`. Locks are held only for the
//! synchronous section of each call, never across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use pipeline::{
    Agent, AgentFilter, AgentId, AgentRepository, GenerationRecord, Petition, PetitionFilter,
    PetitionId, PetitionStore, PetitionSummary, StoreError,
};

/// Agents and petitions held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    agents: Mutex<Vec<Arc<Agent>>>,
    petitions: Mutex<HashMap<PetitionId, Petition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Backend {
        message: "in-memory store lock poisoned".into(),
    })
}

fn merge_record(records: &mut Vec<GenerationRecord>, record: &GenerationRecord) {
    if records.iter().all(|r| r.id != record.id) {
        records.push(record.clone());
        records.sort_by_key(|r| r.sequence);
    }
}

#[async_trait]
impl AgentRepository for MemoryStore {
    async fn add(&self, agent: Agent) -> Result<AgentId, StoreError> {
        let id = agent.id;
        lock(&self.agents)?.push(Arc::new(agent));
        Ok(id)
    }

    async fn get(&self, id: AgentId) -> Result<Option<Arc<Agent>>, StoreError> {
        Ok(lock(&self.agents)?.iter().find(|a| a.id == id).cloned())
    }

    async fn list(&self, filter: &AgentFilter) -> Result<Vec<Arc<Agent>>, StoreError> {
        // Insertion order is registration order.
        Ok(lock(&self.agents)?
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PetitionStore for MemoryStore {
    async fn save(&self, petition: &Petition) -> Result<(), StoreError> {
        let mut petitions = lock(&self.petitions)?;
        let mut records = match petitions.get(&petition.id) {
            Some(stored) if stored.status.is_terminal() => {
                return Err(StoreError::TerminalState {
                    id: stored.id,
                    status: stored.status,
                })
            }
            Some(stored) => stored.records.clone(),
            None => Vec::new(),
        };
        for record in &petition.records {
            merge_record(&mut records, record);
        }

        let mut updated = petition.clone();
        updated.records = records;
        petitions.insert(petition.id, updated);
        Ok(())
    }

    async fn append_record(&self, record: &GenerationRecord) -> Result<(), StoreError> {
        let mut petitions = lock(&self.petitions)?;
        let stored = petitions
            .get_mut(&record.petition_id)
            .ok_or(StoreError::UnknownPetition {
                id: record.petition_id,
            })?;
        if stored.status.is_terminal() {
            return Err(StoreError::TerminalState {
                id: stored.id,
                status: stored.status,
            });
        }
        merge_record(&mut stored.records, record);
        Ok(())
    }

    async fn get(&self, id: PetitionId) -> Result<Option<Petition>, StoreError> {
        Ok(lock(&self.petitions)?.get(&id).cloned())
    }

    async fn list(&self, filter: &PetitionFilter) -> Result<Vec<PetitionSummary>, StoreError> {
        let mut summaries: Vec<PetitionSummary> = lock(&self.petitions)?
            .values()
            .filter(|p| filter.matches(p))
            .map(Petition::summary)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}
