//! services/juris/src/workflow/jurisprudence.rs
//!
//! Case-law research: search through the AI gateway, keep the latest result,
//! and bookmark the useful ones.

use juris_core::domain::{NewSavedJurisprudence, SavedJurisprudence};
use juris_core::ports::{PortError, PortResult};
use tracing::info;
use uuid::Uuid;

use super::LoadingFlag;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub query: String,
    pub html: String,
}

pub struct JurisprudenceDesk {
    state: AppState,
    user_id: Uuid,
    last: Option<SearchResult>,
    loading: LoadingFlag,
}

impl JurisprudenceDesk {
    pub fn new(state: AppState, user_id: Uuid) -> Self {
        Self {
            state,
            user_id,
            last: None,
            loading: LoadingFlag::default(),
        }
    }

    pub fn last_result(&self) -> Option<&SearchResult> {
        self.last.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub async fn search(&mut self, query: &str, area: Option<&str>) -> PortResult<&SearchResult> {
        let _guard = self.loading.begin()?;
        let html = self.state.ai.search_jurisprudence(query, area).await?;
        info!(user_id = %self.user_id, "Jurisprudence search completed.");
        let result = self.last.insert(SearchResult {
            query: query.trim().to_string(),
            html,
        });
        Ok(&*result)
    }

    /// Saves the latest search result.
    pub async fn save(&self) -> PortResult<SavedJurisprudence> {
        let result = self
            .last
            .as_ref()
            .ok_or_else(|| PortError::Validation("Faça uma pesquisa antes de salvar.".to_string()))?;
        self.state
            .backend
            .from::<SavedJurisprudence>()
            .insert_one(NewSavedJurisprudence {
                user_id: self.user_id,
                query: result.query.clone(),
                result: result.html.clone(),
            })
            .select()
            .single()
            .await
    }

    pub async fn list(&self) -> PortResult<Vec<SavedJurisprudence>> {
        self.state
            .backend
            .from::<SavedJurisprudence>()
            .select()
            .eq("user_id", self.user_id.to_string())
            .order("created_at", false)
            .await
    }

    pub async fn delete(&self, id: Uuid) -> PortResult<()> {
        self.state
            .backend
            .from::<SavedJurisprudence>()
            .delete()
            .eq("id", id.to_string())
            .await?;
        Ok(())
    }
}
