//! services/juris/src/workflow/deadlines.rs
//!
//! The procedural deadline board: list, add, toggle and remove a user's deadlines.

use chrono::NaiveDate;
use juris_core::domain::{Deadline, DeadlinePatch, DeadlineStatus, NewDeadline};
use juris_core::ports::{PortError, PortResult};
use tracing::info;
use uuid::Uuid;

use crate::backend::Backend;

/// Procedural deadlines for one user, soonest first.
pub struct DeadlineBoard {
    backend: Backend,
    user_id: Uuid,
}

impl DeadlineBoard {
    pub fn new(backend: Backend, user_id: Uuid) -> Self {
        Self { backend, user_id }
    }

    pub async fn list(&self) -> PortResult<Vec<Deadline>> {
        self.backend
            .from::<Deadline>()
            .select()
            .eq("user_id", self.user_id.to_string())
            .order("due_date", true)
            .await
    }

    pub async fn add(&self, title: &str, due_date: NaiveDate) -> PortResult<Deadline> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PortError::Validation("Informe a descrição do prazo.".to_string()));
        }
        let deadline = self
            .backend
            .from::<Deadline>()
            .insert_one(NewDeadline {
                user_id: self.user_id,
                title: title.to_string(),
                due_date,
                status: DeadlineStatus::Pending,
            })
            .select()
            .single()
            .await?;
        info!(deadline_id = %deadline.id, %due_date, "Deadline added.");
        Ok(deadline)
    }

    /// Flips pending/completed and returns the stored row.
    pub async fn toggle(&self, deadline: &Deadline) -> PortResult<Deadline> {
        let patch = DeadlinePatch {
            status: Some(deadline.status.toggled()),
            ..DeadlinePatch::default()
        };
        self.backend
            .from::<Deadline>()
            .update(&patch)
            .eq("id", deadline.id.to_string())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortError::NotFound(format!("deadline {}", deadline.id)))
    }

    pub async fn delete(&self, deadline_id: Uuid) -> PortResult<()> {
        let removed = self
            .backend
            .from::<Deadline>()
            .delete()
            .eq("id", deadline_id.to_string())
            .await?;
        if removed.is_empty() {
            return Err(PortError::NotFound(format!("deadline {}", deadline_id)));
        }
        info!(%deadline_id, "Deadline deleted.");
        Ok(())
    }
}
