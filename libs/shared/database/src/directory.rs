// libs/shared/database/src/directory.rs
//
// Existence checks for the doctors, patients and rooms that scheduling
// records reference. Their profiles are managed elsewhere; scheduling only
// needs to know whether an id is real.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::supabase::SupabaseClient;

#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, DatabaseError>;
    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, DatabaseError>;
    async fn room_exists(&self, room_id: Uuid) -> Result<bool, DatabaseError>;
}

// ==============================================================================
// IN-MEMORY DIRECTORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryDirectory {
    doctors: RwLock<HashSet<Uuid>>,
    patients: RwLock<HashSet<Uuid>>,
    rooms: RwLock<HashSet<Uuid>>,
    accept_unknown: bool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory that treats every id as known. Used when the API runs
    /// without a backing database.
    pub fn permissive() -> Self {
        Self { accept_unknown: true, ..Self::default() }
    }

    pub async fn register_doctor(&self, doctor_id: Uuid) {
        self.doctors.write().await.insert(doctor_id);
    }

    pub async fn register_patient(&self, patient_id: Uuid) {
        self.patients.write().await.insert(patient_id);
    }

    pub async fn register_room(&self, room_id: Uuid) {
        self.rooms.write().await.insert(room_id);
    }
}

#[async_trait]
impl ResourceDirectory for InMemoryDirectory {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.accept_unknown || self.doctors.read().await.contains(&doctor_id))
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.accept_unknown || self.patients.read().await.contains(&patient_id))
    }

    async fn room_exists(&self, room_id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.accept_unknown || self.rooms.read().await.contains(&room_id))
    }
}

// ==============================================================================
// SUPABASE DIRECTORY
// ==============================================================================

pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn exists(&self, path: String) -> Result<bool, DatabaseError> {
        debug!("Directory lookup: {}", path);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl ResourceDirectory for SupabaseDirectory {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, DatabaseError> {
        self.exists(format!("/rest/v1/profiles?id=eq.{}&role=eq.doctor&select=id", doctor_id)).await
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, DatabaseError> {
        self.exists(format!("/rest/v1/profiles?id=eq.{}&role=eq.patient&select=id", patient_id)).await
    }

    async fn room_exists(&self, room_id: Uuid) -> Result<bool, DatabaseError> {
        self.exists(format!("/rest/v1/rooms?id=eq.{}&select=id", room_id)).await
    }
}
