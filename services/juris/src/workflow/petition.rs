//! services/juris/src/workflow/petition.rs
//!
//! The initial-petition wizard: pick the area, upload the client's
//! documents, review the extracted facts, draft, then review and save.

use juris_core::domain::{
    Attachment, ExtractedCaseData, FilingMetadata, NewPetition, Petition, PetitionRequest,
};
use juris_core::ports::{PortError, PortResult};
use tracing::info;
use uuid::Uuid;

use super::{append_paragraph, ensure_can_generate, DraftSession, WizardExit, LARGE_PROMPT_TOKENS};
use crate::ai::prompts;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PetitionStep {
    Area,
    Upload,
    Details,
    Generate,
    Review,
}

impl PetitionStep {
    fn next(self) -> Option<Self> {
        match self {
            PetitionStep::Area => Some(PetitionStep::Upload),
            PetitionStep::Upload => Some(PetitionStep::Details),
            PetitionStep::Details => Some(PetitionStep::Generate),
            PetitionStep::Generate => Some(PetitionStep::Review),
            PetitionStep::Review => None,
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            PetitionStep::Area => None,
            PetitionStep::Upload => Some(PetitionStep::Area),
            PetitionStep::Details => Some(PetitionStep::Upload),
            PetitionStep::Generate => Some(PetitionStep::Details),
            PetitionStep::Review => Some(PetitionStep::Generate),
        }
    }

    /// Zero-based position, for progress indicators.
    pub fn index(self) -> usize {
        self as usize
    }
}

pub struct PetitionWizard {
    session: DraftSession,
    step: PetitionStep,
    form: PetitionRequest,
}

impl PetitionWizard {
    pub fn new(state: AppState, user_id: Uuid) -> Self {
        Self {
            session: DraftSession::new(state, user_id),
            step: PetitionStep::Area,
            form: PetitionRequest::default(),
        }
    }

    pub fn step(&self) -> PetitionStep {
        self.step
    }

    pub fn form(&self) -> &PetitionRequest {
        &self.form
    }

    /// The form is the caller's to edit between steps.
    pub fn form_mut(&mut self) -> &mut PetitionRequest {
        &mut self.form
    }

    pub fn is_loading(&self) -> bool {
        self.session.loading.is_set()
    }

    pub fn loading_flag(&self) -> super::LoadingFlag {
        self.session.loading.clone()
    }

    pub fn extracted(&self) -> Option<&ExtractedCaseData> {
        self.session.extracted.as_ref()
    }

    pub fn draft(&self) -> Option<&str> {
        self.session.draft.as_deref()
    }

    pub fn metadata(&self) -> Option<&FilingMetadata> {
        self.session.metadata.as_ref()
    }

    pub fn exit(&self) -> Option<&WizardExit> {
        self.session.exit.as_ref()
    }

    /// Token count of the last drafting prompt, when the provider reported one.
    pub fn prompt_tokens(&self) -> Option<u32> {
        self.session.prompt_tokens
    }

    pub fn is_prompt_large(&self) -> bool {
        self.session.prompt_tokens.is_some_and(|tokens| tokens > LARGE_PROMPT_TOKENS)
    }

    pub fn select_area(&mut self, area: impl Into<String>, action_type: impl Into<String>) {
        self.form.area = area.into();
        self.form.action_type = action_type.into();
    }

    pub fn add_document(&mut self, document: Attachment) -> PortResult<()> {
        self.session.add_document(document)
    }

    /// Checks that the current step has what the next one needs.
    fn validate_step(&self) -> PortResult<()> {
        let missing = match self.step {
            PetitionStep::Area if self.form.area.trim().is_empty() => {
                Some("Selecione a área do direito.")
            }
            PetitionStep::Area if self.form.action_type.trim().is_empty() => {
                Some("Informe o tipo de ação.")
            }
            PetitionStep::Upload if self.session.extracted.is_none() => {
                Some("Analise os documentos antes de continuar.")
            }
            PetitionStep::Details if self.form.plaintiff.name.trim().is_empty() => {
                Some("Informe o nome do autor.")
            }
            PetitionStep::Details if self.form.facts.trim().is_empty() => {
                Some("Descreva os fatos do caso.")
            }
            PetitionStep::Generate if self.session.draft.is_none() => {
                Some("Gere a petição antes de revisar.")
            }
            _ => None,
        };
        match missing {
            Some(message) => Err(PortError::Validation(message.to_string())),
            None => Ok(()),
        }
    }

    pub fn next(&mut self) -> PortResult<PetitionStep> {
        self.session.ensure_open()?;
        self.validate_step()?;
        let next = self
            .step
            .next()
            .ok_or_else(|| PortError::Validation("Esta é a última etapa.".to_string()))?;
        self.step = next;
        Ok(next)
    }

    pub fn back(&mut self) -> PetitionStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Extracts case data and pre-fills the parties and facts with it.
    pub async fn extract(&mut self) -> PortResult<ExtractedCaseData> {
        let data = self.session.extract().await?;
        prefill(&mut self.form, &data);
        self.form.analyzed_documents = self.session.document_names();
        Ok(data)
    }

    /// Transcribes a dictated account of the case and appends it to the facts.
    pub async fn dictate(&mut self, audio: Attachment) -> PortResult<String> {
        let transcript = self.session.transcribe(audio).await?;
        append_paragraph(&mut self.form.facts, &transcript);
        Ok(transcript)
    }

    pub async fn generate(&mut self) -> PortResult<String> {
        self.session.ensure_open()?;
        if self.step != PetitionStep::Generate {
            return Err(PortError::Validation(
                "Conclua as etapas anteriores antes de gerar a petição.".to_string(),
            ));
        }
        let _guard = self.session.loading.begin()?;
        ensure_can_generate(&self.session.state, self.session.user_id).await?;

        self.session.measure_prompt(&prompts::petition_prompt(&self.form)).await;
        let html = self.session.state.ai.generate_legal_petition(&self.form).await?;
        info!(user_id = %self.session.user_id, area = %self.form.area, "Petition drafted.");
        self.session.draft = Some(html.clone());
        self.session.metadata = None;
        Ok(html)
    }

    pub async fn refine(&mut self, instructions: &str) -> PortResult<String> {
        self.session.refine(instructions).await
    }

    pub async fn suggest_metadata(&mut self) -> PortResult<FilingMetadata> {
        self.session.suggest_metadata().await
    }

    /// Stores the draft under the signed-in user and ends the wizard.
    pub async fn save(&mut self) -> PortResult<Petition> {
        if self.step != PetitionStep::Review {
            return Err(PortError::Validation(
                "Revise a petição antes de salvar.".to_string(),
            ));
        }
        let row = NewPetition {
            user_id: self.session.user_id,
            area: self.form.area.clone(),
            action_type: self.form.action_type.clone(),
            content: String::new(),
            plaintiff_name: self.form.plaintiff.name.clone(),
            defendant_name: self.form.defendant.name.clone(),
            analyzed_documents: self.form.analyzed_documents.clone(),
        };
        self.session.save(row).await
    }

    pub fn cancel(&mut self) {
        self.session.cancel();
    }
}

/// Copies extracted values into empty form fields. Anything the lawyer
/// already typed wins.
fn prefill(form: &mut PetitionRequest, data: &ExtractedCaseData) {
    fn fill(target: &mut String, value: &str) {
        if target.trim().is_empty() && !value.trim().is_empty() {
            *target = value.trim().to_string();
        }
    }

    fill(&mut form.plaintiff.name, &data.plaintiff_name);
    fill(&mut form.plaintiff.document, &data.plaintiff_document);
    fill(&mut form.plaintiff.address, &data.plaintiff_address);
    fill(&mut form.defendant.name, &data.defendant_name);
    fill(&mut form.defendant.document, &data.defendant_document);
    fill(&mut form.defendant.address, &data.defendant_address);
    fill(&mut form.facts, &data.facts_summary);
    if form.claim_value.is_none() {
        form.claim_value = data.claimed_value.clone().filter(|v| !v.trim().is_empty());
    }
}
