//! In-memory stores
//!
//! Same contract as the SQLite store without touching disk. Reads and writes
//! can be switched to fail to exercise storage-degraded paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use cooktime_common::Meal;

use super::{MealStore, SessionStore};
use crate::error::{Error, Result};
use crate::session::Session;

#[derive(Default)]
struct Documents {
    meals: Vec<Meal>,
    active_id: Option<String>,
    session: Option<Session>,
}

/// Meal and session store held in process memory
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<Documents>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a catalog and active id
    pub fn with_meals(meals: Vec<Meal>, active_id: Option<String>) -> Self {
        let store = Self::default();
        {
            let mut docs = store.docs.lock().unwrap_or_else(PoisonError::into_inner);
            docs.meals = meals;
            docs.active_id = active_id;
        }
        store
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail (or succeed again)
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Current session record, bypassing the trait
    pub fn session_snapshot(&self) -> Option<Session> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner).session.clone()
    }

    /// Current catalog, bypassing the trait
    pub fn meals_snapshot(&self) -> Vec<Meal> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner).meals.clone()
    }

    fn write<F: FnOnce(&mut Documents)>(&self, f: F) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("in-memory store is read-only".to_string()));
        }
        f(&mut self.docs.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(())
    }

    fn read<T, F: FnOnce(&Documents) -> T>(&self, f: F) -> Result<T> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Storage("in-memory store is locked".to_string()));
        }
        Ok(f(&self.docs.lock().unwrap_or_else(PoisonError::into_inner)))
    }
}

#[async_trait]
impl MealStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Meal>> {
        self.read(|d| d.meals.clone())
    }

    async fn save(&self, meals: &[Meal]) -> Result<()> {
        self.write(|d| d.meals = meals.to_vec())
    }

    async fn get_active_id(&self) -> Result<Option<String>> {
        self.read(|d| d.active_id.clone())
    }

    async fn set_active_id(&self, id: &str) -> Result<()> {
        self.write(|d| d.active_id = Some(id.to_string()))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self) -> Result<Option<Session>> {
        self.read(|d| d.session.clone())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.write(|d| d.session = Some(session.clone()))
    }

    async fn clear(&self) -> Result<()> {
        self.write(|d| d.session = None)
    }
}
