//! services/juris/src/workflow/mod.rs
//!
//! The orchestration layer: the shell that tracks the current view and the
//! signed-in profile, the drafting wizards, and the deadline and
//! jurisprudence tools. Everything here talks to the backend facade and the
//! AI gateway; nothing touches an adapter directly.

pub mod deadlines;
pub mod defense;
pub mod jurisprudence;
pub mod petition;
pub mod shell;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use juris_core::domain::{
    AccountStatus, Attachment, ExtractedCaseData, FilingMetadata, NewPetition, Petition, Profile,
    UsageLimit,
};
use juris_core::ports::{PortError, PortResult};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::AppState;

pub use deadlines::DeadlineBoard;
pub use defense::{DefenseStep, DefenseWizard};
pub use jurisprudence::JurisprudenceDesk;
pub use petition::{PetitionStep, PetitionWizard};
pub use shell::{Shell, View};

//=========================================================================================
// In-flight flag
//=========================================================================================

/// Shared "request in flight" flag. Clones observe the same value, so a UI
/// can watch it while the owner awaits.
#[derive(Clone, Debug, Default)]
pub struct LoadingFlag(Arc<AtomicBool>);

impl LoadingFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sets the flag until the returned guard drops, on success and failure
    /// alike. Fails when a request is already in flight.
    pub fn begin(&self) -> PortResult<LoadingGuard> {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| {
                PortError::Validation("Aguarde a conclusão da solicitação em andamento.".to_string())
            })?;
        Ok(LoadingGuard(self.0.clone()))
    }
}

pub struct LoadingGuard(Arc<AtomicBool>);

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

//=========================================================================================
// Wizard plumbing shared by the petition and defense flows
//=========================================================================================

/// Prompts above this many tokens are logged as oversized before drafting.
pub const LARGE_PROMPT_TOKENS: u32 = 100_000;

/// How a wizard ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardExit {
    Cancelled,
    Saved(Petition),
}

/// Refuses AI work for blocked accounts and for users with no drafts left
/// this month.
pub async fn ensure_can_generate(state: &AppState, user_id: Uuid) -> PortResult<UsageLimit> {
    let profile = state
        .backend
        .from::<Profile>()
        .select()
        .eq("id", user_id.to_string())
        .single()
        .await?;
    if profile.account_status == AccountStatus::Blocked {
        warn!(%user_id, "Generation refused for blocked account.");
        return Err(PortError::Unauthorized(
            "Sua conta está bloqueada. Entre em contato com o suporte.".to_string(),
        ));
    }

    let usage = state
        .backend
        .from::<UsageLimit>()
        .select()
        .eq("user_id", user_id.to_string())
        .single()
        .await?;
    if usage.is_exhausted() {
        warn!(%user_id, limit = usage.monthly_limit, "Generation refused: monthly limit reached.");
        return Err(PortError::Validation(format!(
            "Você atingiu o limite de {} peças neste mês.",
            usage.monthly_limit
        )));
    }
    Ok(usage)
}

/// Adds `text` to a free-text form field as a new paragraph.
fn append_paragraph(field: &mut String, text: &str) {
    if field.trim().is_empty() {
        *field = text.to_string();
    } else {
        field.push_str("\n\n");
        field.push_str(text);
    }
}

/// The state both drafting wizards carry besides their own form.
pub struct DraftSession {
    state: AppState,
    user_id: Uuid,
    documents: Vec<Attachment>,
    extracted: Option<ExtractedCaseData>,
    draft: Option<String>,
    metadata: Option<FilingMetadata>,
    prompt_tokens: Option<u32>,
    loading: LoadingFlag,
    exit: Option<WizardExit>,
}

impl DraftSession {
    fn new(state: AppState, user_id: Uuid) -> Self {
        Self {
            state,
            user_id,
            documents: Vec::new(),
            extracted: None,
            draft: None,
            metadata: None,
            prompt_tokens: None,
            loading: LoadingFlag::default(),
            exit: None,
        }
    }

    fn ensure_open(&self) -> PortResult<()> {
        match self.exit {
            None => Ok(()),
            Some(_) => Err(PortError::Validation("Este assistente já foi encerrado.".to_string())),
        }
    }

    fn add_document(&mut self, document: Attachment) -> PortResult<()> {
        self.ensure_open()?;
        if document.data.is_empty() {
            return Err(PortError::Validation(format!(
                "O arquivo {} está vazio.",
                document.file_name
            )));
        }
        self.documents.push(document);
        self.extracted = None;
        Ok(())
    }

    fn document_names(&self) -> Vec<String> {
        self.documents.iter().map(|doc| doc.file_name.clone()).collect()
    }

    /// Runs extraction over the uploaded documents. An empty result does not
    /// count as a successful extraction.
    async fn extract(&mut self) -> PortResult<ExtractedCaseData> {
        self.ensure_open()?;
        let _guard = self.loading.begin()?;
        let data = self.state.ai.extract_data_from_document(&self.documents).await?;
        if data.is_empty() {
            warn!(files = self.documents.len(), "Extraction returned no usable data.");
            return Err(PortError::Validation(
                "Não foi possível extrair dados dos documentos enviados.".to_string(),
            ));
        }
        self.extracted = Some(data.clone());
        Ok(data)
    }

    /// Transcribes a dictated recording and returns the trimmed text.
    async fn transcribe(&mut self, audio: Attachment) -> PortResult<String> {
        self.ensure_open()?;
        let _guard = self.loading.begin()?;
        let transcript = self.state.ai.transcribe_audio(audio).await?;
        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(PortError::Validation(
                "Não foi possível transcrever o áudio.".to_string(),
            ));
        }
        info!(user_id = %self.user_id, chars = transcript.len(), "Dictation transcribed.");
        Ok(transcript)
    }

    /// Counts the drafting prompt's tokens. Oversized prompts are logged; a
    /// failed count never blocks drafting.
    async fn measure_prompt(&mut self, prompt: &str) {
        self.prompt_tokens = match self.state.ai.count_tokens(prompt).await {
            Ok(tokens) => {
                if tokens > LARGE_PROMPT_TOKENS {
                    warn!(
                        user_id = %self.user_id,
                        tokens,
                        limit = LARGE_PROMPT_TOKENS,
                        "Drafting prompt is very large; the response may be truncated."
                    );
                }
                Some(tokens)
            }
            Err(error) => {
                debug!(error = %error, "Token count unavailable.");
                None
            }
        };
    }

    async fn refine(&mut self, instructions: &str) -> PortResult<String> {
        self.ensure_open()?;
        let current = self
            .draft
            .clone()
            .ok_or_else(|| PortError::Validation("Gere a peça antes de revisá-la.".to_string()))?;
        let _guard = self.loading.begin()?;
        ensure_can_generate(&self.state, self.user_id).await?;
        let refined = self.state.ai.refine_legal_petition(&current, instructions).await?;
        self.draft = Some(refined.clone());
        self.metadata = None;
        Ok(refined)
    }

    async fn suggest_metadata(&mut self) -> PortResult<FilingMetadata> {
        self.ensure_open()?;
        let draft = self
            .draft
            .clone()
            .ok_or_else(|| PortError::Validation("Gere a peça antes do cadastro.".to_string()))?;
        let _guard = self.loading.begin()?;
        let metadata = self.state.ai.suggest_filing_metadata(&draft).await?;
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    async fn save(&mut self, mut row: NewPetition) -> PortResult<Petition> {
        self.ensure_open()?;
        let content = self
            .draft
            .clone()
            .ok_or_else(|| PortError::Validation("Não há peça para salvar.".to_string()))?;
        row.content = content;
        let _guard = self.loading.begin()?;
        let petition = self
            .state
            .backend
            .from::<Petition>()
            .insert_one(row)
            .select()
            .single()
            .await?;
        info!(petition_id = %petition.id, user_id = %self.user_id, "Petition saved.");
        self.exit = Some(WizardExit::Saved(petition.clone()));
        Ok(petition)
    }

    fn cancel(&mut self) {
        if self.exit.is_none() {
            self.exit = Some(WizardExit::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_guard_clears_on_drop() {
        let flag = LoadingFlag::default();
        let observer = flag.clone();
        {
            let _guard = flag.begin().unwrap();
            assert!(observer.is_set());
            assert!(flag.begin().is_err());
        }
        assert!(!observer.is_set());
        assert!(flag.begin().is_ok());
    }
}
