//! Return reconciliation
//!
//! Matches scanned barcodes against the copies expected back for a borrow
//! record. Barcodes are trimmed and compared case-insensitively.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Copy expected back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedCopy {
    pub barcode: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CopyState {
    Pending,
    Matched,
    Lost,
}

/// Result of one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ScanOutcome {
    Matched { barcode: String, title: String },
    Duplicate { barcode: String },
    Unexpected { barcode: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReturnPhase {
    Scanning,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyView {
    pub barcode: String,
    pub title: String,
    pub state: CopyState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnView {
    pub id: Uuid,
    pub borrow_record_id: Uuid,
    pub phase: ReturnPhase,
    pub copies: Vec<CopyView>,
    pub unexpected: Vec<String>,
    pub submittable: bool,
}

#[derive(Debug, Clone)]
struct TrackedCopy {
    copy: ExpectedCopy,
    key: String,
    state: CopyState,
}

/// Reconciliation state of one return
#[derive(Debug, Clone)]
pub struct ReturnReconciler {
    id: Uuid,
    borrow_record_id: Uuid,
    copies: Vec<TrackedCopy>,
    unexpected: Vec<String>,
}

fn normalize(barcode: &str) -> String {
    barcode.trim().to_uppercase()
}

impl ReturnReconciler {
    /// Start reconciling; barcodes must be non-empty and distinct
    pub fn new(borrow_record_id: Uuid, copies: Vec<ExpectedCopy>) -> Result<Self> {
        if copies.is_empty() {
            return Err(Error::BadRequest("No copies to return".to_string()));
        }

        let mut tracked: Vec<TrackedCopy> = Vec::with_capacity(copies.len());
        for copy in copies {
            let key = normalize(&copy.barcode);
            if key.is_empty() {
                return Err(Error::BadRequest("Copy barcode must not be empty".to_string()));
            }
            if tracked.iter().any(|t| t.key == key) {
                return Err(Error::BadRequest(format!(
                    "Duplicate copy barcode: {}",
                    copy.barcode.trim()
                )));
            }
            tracked.push(TrackedCopy {
                copy: ExpectedCopy {
                    barcode: copy.barcode.trim().to_string(),
                    title: copy.title,
                },
                key,
                state: CopyState::Pending,
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            borrow_record_id,
            copies: tracked,
            unexpected: Vec::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scan(&mut self, raw: &str) -> Result<ScanOutcome> {
        let key = normalize(raw);
        if key.is_empty() {
            return Err(Error::BadRequest("Scanned barcode is empty".to_string()));
        }

        let outcome = match self.copies.iter_mut().find(|t| t.key == key) {
            Some(tracked) if tracked.state == CopyState::Matched => ScanOutcome::Duplicate {
                barcode: tracked.copy.barcode.clone(),
            },
            Some(tracked) => {
                // A copy marked lost that turns up is simply returned
                tracked.state = CopyState::Matched;
                ScanOutcome::Matched {
                    barcode: tracked.copy.barcode.clone(),
                    title: tracked.copy.title.clone(),
                }
            }
            None => {
                let barcode = raw.trim().to_string();
                if !self.unexpected.iter().any(|u| normalize(u) == key) {
                    self.unexpected.push(barcode.clone());
                }
                ScanOutcome::Unexpected { barcode }
            }
        };

        debug!(return_id = %self.id, ?outcome, "Barcode scanned");
        Ok(outcome)
    }

    /// Mark an expected, not yet scanned copy as lost
    pub fn mark_lost(&mut self, barcode: &str) -> Result<()> {
        let key = normalize(barcode);
        let tracked = self
            .copies
            .iter_mut()
            .find(|t| t.key == key)
            .ok_or_else(|| Error::BadRequest(format!("Not an expected copy: {}", barcode.trim())))?;

        if tracked.state == CopyState::Matched {
            return Err(Error::InvalidState(format!(
                "Copy {} was already scanned",
                tracked.copy.barcode
            )));
        }
        tracked.state = CopyState::Lost;
        info!(return_id = %self.id, barcode = %tracked.copy.barcode, "Copy marked lost");
        Ok(())
    }

    pub fn phase(&self) -> ReturnPhase {
        if self.copies.iter().any(|t| t.state == CopyState::Pending) {
            ReturnPhase::Scanning
        } else {
            ReturnPhase::Complete
        }
    }

    pub fn is_submittable(&self) -> bool {
        self.phase() == ReturnPhase::Complete && self.unexpected.is_empty()
    }

    pub fn view(&self) -> ReturnView {
        ReturnView {
            id: self.id,
            borrow_record_id: self.borrow_record_id,
            phase: self.phase(),
            copies: self
                .copies
                .iter()
                .map(|t| CopyView {
                    barcode: t.copy.barcode.clone(),
                    title: t.copy.title.clone(),
                    state: t.state,
                })
                .collect(),
            unexpected: self.unexpected.clone(),
            submittable: self.is_submittable(),
        }
    }
}

/// In-memory return sessions
#[derive(Default)]
pub struct ReturnRegistry {
    sessions: RwLock<HashMap<Uuid, ReturnReconciler>>,
}

impl ReturnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, borrow_record_id: Uuid, copies: Vec<ExpectedCopy>) -> Result<ReturnView> {
        let reconciler = ReturnReconciler::new(borrow_record_id, copies)?;
        let view = reconciler.view();
        info!(return_id = %view.id, %borrow_record_id, copies = view.copies.len(), "Return started");
        self.sessions.write().await.insert(reconciler.id(), reconciler);
        Ok(view)
    }

    pub async fn get(&self, id: Uuid) -> Result<ReturnView> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(ReturnReconciler::view)
            .ok_or(Error::ReturnNotFound(id))
    }

    pub async fn scan(&self, id: Uuid, barcode: &str) -> Result<(ScanOutcome, ReturnView)> {
        let mut sessions = self.sessions.write().await;
        let reconciler = sessions.get_mut(&id).ok_or(Error::ReturnNotFound(id))?;
        let outcome = reconciler.scan(barcode)?;
        Ok((outcome, reconciler.view()))
    }

    pub async fn mark_lost(&self, id: Uuid, barcode: &str) -> Result<ReturnView> {
        let mut sessions = self.sessions.write().await;
        let reconciler = sessions.get_mut(&id).ok_or(Error::ReturnNotFound(id))?;
        reconciler.mark_lost(barcode)?;
        Ok(reconciler.view())
    }

    /// Remove a finished or abandoned return, returning its final view
    pub async fn close(&self, id: Uuid) -> Result<ReturnView> {
        let reconciler = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(Error::ReturnNotFound(id))?;
        let view = reconciler.view();
        info!(return_id = %id, submittable = view.submittable, "Return closed");
        Ok(view)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
