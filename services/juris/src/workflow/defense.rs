//! services/juris/src/workflow/defense.rs
//!
//! The defense wizard. The uploaded document is the opposing party's
//! initial petition, so the extracted plaintiff becomes the opposing party
//! and the extracted defendant is our client.

use juris_core::domain::{
    Attachment, DefenseRequest, ExtractedCaseData, FilingMetadata, NewPetition, Petition,
};
use juris_core::ports::{PortError, PortResult};
use tracing::info;
use uuid::Uuid;

use super::{append_paragraph, ensure_can_generate, DraftSession, LoadingFlag, WizardExit};
use crate::ai::prompts;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DefenseStep {
    Upload,
    Details,
    Generate,
    Review,
}

impl DefenseStep {
    fn next(self) -> Option<Self> {
        match self {
            DefenseStep::Upload => Some(DefenseStep::Details),
            DefenseStep::Details => Some(DefenseStep::Generate),
            DefenseStep::Generate => Some(DefenseStep::Review),
            DefenseStep::Review => None,
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            DefenseStep::Upload => None,
            DefenseStep::Details => Some(DefenseStep::Upload),
            DefenseStep::Generate => Some(DefenseStep::Details),
            DefenseStep::Review => Some(DefenseStep::Generate),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

pub struct DefenseWizard {
    session: DraftSession,
    step: DefenseStep,
    form: DefenseRequest,
}

impl DefenseWizard {
    pub fn new(state: AppState, user_id: Uuid) -> Self {
        Self {
            session: DraftSession::new(state, user_id),
            step: DefenseStep::Upload,
            form: DefenseRequest {
                defense_type: "Contestação".to_string(),
                ..DefenseRequest::default()
            },
        }
    }

    pub fn step(&self) -> DefenseStep {
        self.step
    }

    pub fn form(&self) -> &DefenseRequest {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut DefenseRequest {
        &mut self.form
    }

    pub fn is_loading(&self) -> bool {
        self.session.loading.is_set()
    }

    pub fn loading_flag(&self) -> LoadingFlag {
        self.session.loading.clone()
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

    pub fn prompt_tokens(&self) -> Option<u32> {
        self.session.prompt_tokens
    }

    pub fn add_document(&mut self, document: Attachment) -> PortResult<()> {
        self.session.add_document(document)
    }

    fn validate_step(&self) -> PortResult<()> {
        let missing = match self.step {
            DefenseStep::Upload if self.session.extracted.is_none() => {
                Some("Analise a petição inicial antes de continuar.")
            }
            DefenseStep::Details if self.form.client.name.trim().is_empty() => {
                Some("Informe o nome do cliente.")
            }
            DefenseStep::Details if self.form.defense_facts.trim().is_empty() => {
                Some("Descreva a versão do cliente.")
            }
            DefenseStep::Generate if self.session.draft.is_none() => {
                Some("Gere a defesa antes de revisar.")
            }
            _ => None,
        };
        match missing {
            Some(message) => Err(PortError::Validation(message.to_string())),
            None => Ok(()),
        }
    }

    pub fn next(&mut self) -> PortResult<DefenseStep> {
        self.session.ensure_open()?;
        self.validate_step()?;
        let next = self
            .step
            .next()
            .ok_or_else(|| PortError::Validation("Esta é a última etapa.".to_string()))?;
        self.step = next;
        Ok(next)
    }

    pub fn back(&mut self) -> DefenseStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    pub async fn extract(&mut self) -> PortResult<ExtractedCaseData> {
        let data = self.session.extract().await?;
        prefill(&mut self.form, &data);
        self.form.analyzed_documents = self.session.document_names();
        Ok(data)
    }

    /// Appends the client's dictated version of events to the defense facts.
    pub async fn dictate(&mut self, audio: Attachment) -> PortResult<String> {
        let transcript = self.session.transcribe(audio).await?;
        append_paragraph(&mut self.form.defense_facts, &transcript);
        Ok(transcript)
    }

    pub async fn generate(&mut self) -> PortResult<String> {
        self.session.ensure_open()?;
        if self.step != DefenseStep::Generate {
            return Err(PortError::Validation(
                "Conclua as etapas anteriores antes de gerar a defesa.".to_string(),
            ));
        }
        let _guard = self.session.loading.begin()?;
        ensure_can_generate(&self.session.state, self.session.user_id).await?;

        self.session.measure_prompt(&prompts::defense_prompt(&self.form)).await;
        let html = self.session.state.ai.generate_legal_defense(&self.form).await?;
        info!(user_id = %self.session.user_id, defense_type = %self.form.defense_type, "Defense drafted.");
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

    /// Defenses are stored alongside petitions; `action_type` carries the
    /// defense type and the parties keep their roles in the original suit.
    pub async fn save(&mut self) -> PortResult<Petition> {
        if self.step != DefenseStep::Review {
            return Err(PortError::Validation("Revise a defesa antes de salvar.".to_string()));
        }
        let row = NewPetition {
            user_id: self.session.user_id,
            area: self.form.area.clone(),
            action_type: self.form.defense_type.clone(),
            content: String::new(),
            plaintiff_name: self.form.opposing_party.name.clone(),
            defendant_name: self.form.client.name.clone(),
            analyzed_documents: self.form.analyzed_documents.clone(),
        };
        self.session.save(row).await
    }

    pub fn cancel(&mut self) {
        self.session.cancel();
    }
}

fn prefill(form: &mut DefenseRequest, data: &ExtractedCaseData) {
    fn fill(target: &mut String, value: &str) {
        if target.trim().is_empty() && !value.trim().is_empty() {
            *target = value.trim().to_string();
        }
    }

    fill(&mut form.client.name, &data.defendant_name);
    fill(&mut form.client.document, &data.defendant_document);
    fill(&mut form.client.address, &data.defendant_address);
    fill(&mut form.opposing_party.name, &data.plaintiff_name);
    fill(&mut form.opposing_party.document, &data.plaintiff_document);
    fill(&mut form.opposing_party.address, &data.plaintiff_address);
    fill(&mut form.initial_claim_summary, &data.facts_summary);
}
