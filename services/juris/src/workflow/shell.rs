//! services/juris/src/workflow/shell.rs
//!
//! The navigation shell. It follows the auth channel, loads the signed-in
//! user's profile and usage, decides which views are reachable, and hands
//! out the wizards and tools for the current user.

use juris_core::domain::{
    AccountStatus, AuthEvent, AuthEventKind, NewProfile, Petition, PetitionPatch, Profile,
    ProfilePatch, Session, UsageLimit,
};
use juris_core::events::Subscription;
use juris_core::ports::{PortError, PortResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DeadlineBoard, DefenseWizard, JurisprudenceDesk, PetitionWizard, WizardExit};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Petitions,
    Deadlines,
    Jurisprudence,
    Admin,
    NewPetition,
    NewDefense,
}

pub struct Shell {
    state: AppState,
    view: View,
    session: Option<Session>,
    profile: Option<Profile>,
    usage: Option<UsageLimit>,
    events: mpsc::UnboundedReceiver<AuthEvent>,
    subscription: Option<Subscription>,
}

impl Shell {
    /// Creates the shell and subscribes it to auth changes. The current
    /// state is queued right away, so the first `sync_auth` loads it.
    pub fn new(state: AppState) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let listener = Arc::new(move |event: &AuthEvent| {
            // The receiver only goes away with the shell.
            let _ = tx.send(event.clone());
        });
        let subscription = state.backend.auth().on_auth_state_change(listener);
        Self {
            state,
            view: View::Dashboard,
            session: None,
            profile: None,
            usage: None,
            events,
            subscription: Some(subscription),
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn usage(&self) -> Option<&UsageLimit> {
        self.usage.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(Profile::is_admin)
    }

    /// Applies queued auth events. Returns whether anything changed.
    pub async fn sync_auth(&mut self) -> PortResult<bool> {
        let mut latest = None;
        while let Ok(event) = self.events.try_recv() {
            latest = Some(event);
        }
        let Some(event) = latest else {
            return Ok(false);
        };

        debug!(kind = ?event.kind, "Auth state changed.");
        match event.kind {
            AuthEventKind::SignedIn => {
                self.session = event.session;
                self.refresh().await?;
            }
            AuthEventKind::SignedOut => self.clear(),
        }
        Ok(true)
    }

    fn clear(&mut self) {
        self.session = None;
        self.profile = None;
        self.usage = None;
        self.view = View::Dashboard;
    }

    fn user_id(&self) -> PortResult<Uuid> {
        self.session
            .as_ref()
            .map(|session| session.user.id)
            .ok_or_else(|| PortError::Unauthorized("Faça login para continuar.".to_string()))
    }

    /// Reloads the profile and usage of the signed-in user, creating a trial
    /// profile for accounts that do not have one yet.
    pub async fn refresh(&mut self) -> PortResult<Option<&Profile>> {
        if self.session.is_none() {
            self.session = self.state.backend.auth().get_session().await;
        }
        let Some(session) = self.session.clone() else {
            self.clear();
            return Ok(None);
        };
        let user_id = session.user.id;

        let profile = match self
            .state
            .backend
            .from::<Profile>()
            .select()
            .eq("id", user_id.to_string())
            .single()
            .await
        {
            Ok(profile) => profile,
            Err(e) if e.is_not_found() => {
                info!(%user_id, "No profile yet; creating a trial profile.");
                let full_name = session
                    .user
                    .email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                self.state
                    .backend
                    .from::<Profile>()
                    .insert_one(NewProfile::trial(user_id, full_name, session.user.email.clone()))
                    .select()
                    .single()
                    .await?
            }
            Err(e) => {
                warn!(%user_id, error = %e, "Failed to load profile.");
                return Err(e);
            }
        };

        let usage = self
            .state
            .backend
            .from::<UsageLimit>()
            .select()
            .eq("user_id", user_id.to_string())
            .single()
            .await?;

        if self.view == View::Admin && !profile.is_admin() {
            self.view = View::Dashboard;
        }
        self.usage = Some(usage);
        Ok(Some(&*self.profile.insert(profile)))
    }

    /// Switches views. Every view but the dashboard needs a signed-in user,
    /// and only admins reach the admin panel.
    pub fn navigate(&mut self, view: View) -> PortResult<View> {
        if view != View::Dashboard && self.profile.is_none() {
            return Err(PortError::Unauthorized("Faça login para continuar.".to_string()));
        }
        if view == View::Admin && !self.is_admin() {
            warn!("Non-admin tried to open the admin panel.");
            return Err(PortError::Unauthorized(
                "Acesso restrito a administradores.".to_string(),
            ));
        }
        self.view = view;
        Ok(view)
    }

    pub async fn sign_out(&mut self) -> PortResult<()> {
        self.state.backend.auth().sign_out().await?;
        self.sync_auth().await?;
        self.clear();
        Ok(())
    }

    //=====================================================================================
    // Petitions list
    //=====================================================================================

    pub async fn petitions(&self) -> PortResult<Vec<Petition>> {
        self.state
            .backend
            .from::<Petition>()
            .select()
            .eq("user_id", self.user_id()?.to_string())
            .order("created_at", false)
            .await
    }

    pub async fn mark_filed(&self, petition_id: Uuid) -> PortResult<Petition> {
        let patch = PetitionPatch { filed: Some(true) };
        self.state
            .backend
            .from::<Petition>()
            .update(&patch)
            .eq("id", petition_id.to_string())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortError::NotFound(format!("petition {}", petition_id)))
    }

    //=====================================================================================
    // Tools and wizards
    //=====================================================================================

    pub fn open_petition_wizard(&mut self) -> PortResult<PetitionWizard> {
        let user_id = self.user_id()?;
        self.navigate(View::NewPetition)?;
        Ok(PetitionWizard::new(self.state.clone(), user_id))
    }

    pub fn open_defense_wizard(&mut self) -> PortResult<DefenseWizard> {
        let user_id = self.user_id()?;
        self.navigate(View::NewDefense)?;
        Ok(DefenseWizard::new(self.state.clone(), user_id))
    }

    pub fn deadline_board(&self) -> PortResult<DeadlineBoard> {
        Ok(DeadlineBoard::new(self.state.backend.clone(), self.user_id()?))
    }

    pub fn jurisprudence_desk(&self) -> PortResult<JurisprudenceDesk> {
        Ok(JurisprudenceDesk::new(self.state.clone(), self.user_id()?))
    }

    /// Leaves a wizard: saved drafts land on the petitions list with fresh
    /// usage, cancelled ones go back to the dashboard.
    pub async fn finish_wizard(&mut self, exit: &WizardExit) -> PortResult<View> {
        match exit {
            WizardExit::Saved(_) => {
                self.refresh().await?;
                self.navigate(View::Petitions)
            }
            WizardExit::Cancelled => self.navigate(View::Dashboard),
        }
    }

    //=====================================================================================
    // Admin
    //=====================================================================================

    fn ensure_admin(&self) -> PortResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(PortError::Unauthorized("Acesso restrito a administradores.".to_string()))
        }
    }

    /// All profiles, newest first.
    pub async fn list_profiles(&self) -> PortResult<Vec<Profile>> {
        self.ensure_admin()?;
        self.state
            .backend
            .from::<Profile>()
            .select()
            .order("created_at", false)
            .await
    }

    pub async fn set_account_status(&self, user_id: Uuid, status: AccountStatus) -> PortResult<Profile> {
        self.ensure_admin()?;
        if self.user_id()? == user_id {
            return Err(PortError::Validation(
                "Você não pode alterar o status da própria conta.".to_string(),
            ));
        }
        let patch = ProfilePatch {
            account_status: Some(status),
            ..ProfilePatch::default()
        };
        let profile = self
            .state
            .backend
            .from::<Profile>()
            .update(&patch)
            .eq("id", user_id.to_string())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortError::NotFound(format!("profile {}", user_id)))?;
        info!(%user_id, status = ?status, "Account status changed.");
        Ok(profile)
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use juris_core::domain::Credentials;
    use juris_core::ports::AuthService;

    #[tokio::test]
    async fn sign_up_loads_the_trial_profile() {
        let harness = Harness::new(vec![]).await;
        let mut shell = Shell::new(harness.state.clone());
        assert!(shell.sync_auth().await.unwrap());
        assert!(shell.profile().is_none());

        harness.sign_up("ana@x.com", "Ana Souza").await;
        assert!(shell.sync_auth().await.unwrap());

        let profile = shell.profile().unwrap();
        assert_eq!(profile.full_name, "Ana Souza");
        assert_eq!(profile.account_status, AccountStatus::Trial);
        assert_eq!(shell.usage().unwrap().used_this_month, 0);
        assert!(!shell.sync_auth().await.unwrap());
    }

    #[tokio::test]
    async fn missing_profile_is_created_on_refresh() {
        let harness = Harness::new(vec![]).await;
        let mut shell = Shell::new(harness.state.clone());
        harness
            .mock
            .sign_in_with_password(Credentials {
                email: "novo@escritorio.com".to_string(),
                password: "x".to_string(),
            })
            .await
            .unwrap();

        shell.sync_auth().await.unwrap();

        let profile = shell.profile().unwrap();
        assert_eq!(profile.email, "novo@escritorio.com");
        assert_eq!(profile.full_name, "novo");
        assert_eq!(profile.account_status, AccountStatus::Trial);
    }

    #[tokio::test]
    async fn only_admins_reach_the_admin_view() {
        let harness = Harness::new(vec![]).await;
        let mut shell = Shell::new(harness.state.clone());
        assert!(shell.navigate(View::Petitions).is_err());

        harness.sign_up("ana@x.com", "Ana Souza").await;
        shell.sync_auth().await.unwrap();
        assert!(matches!(shell.navigate(View::Admin), Err(PortError::Unauthorized(_))));
        assert!(shell.list_profiles().await.is_err());
        assert_eq!(shell.navigate(View::Deadlines).unwrap(), View::Deadlines);

        harness.sign_in_demo().await;
        shell.sync_auth().await.unwrap();
        assert!(shell.is_admin());
        assert_eq!(shell.navigate(View::Admin).unwrap(), View::Admin);
    }

    #[tokio::test]
    async fn admin_blocks_a_user() {
        let harness = Harness::new(vec![]).await;
        let ana = harness.sign_up("ana@x.com", "Ana Souza").await;
        harness.sign_in_demo().await;
        let mut shell = Shell::new(harness.state.clone());
        shell.sync_auth().await.unwrap();

        let profiles = shell.list_profiles().await.unwrap();
        assert!(profiles.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
        assert!(profiles.iter().any(|p| p.id == ana.user.id));

        let updated = shell
            .set_account_status(ana.user.id, AccountStatus::Blocked)
            .await
            .unwrap();
        assert_eq!(updated.account_status, AccountStatus::Blocked);

        let fetched = harness
            .state
            .backend
            .from::<Profile>()
            .select()
            .eq("id", ana.user.id.to_string())
            .single()
            .await
            .unwrap();
        assert_eq!(fetched.account_status, AccountStatus::Blocked);

        let own_id = shell.profile().unwrap().id;
        assert!(shell.set_account_status(own_id, AccountStatus::Blocked).await.is_err());
    }

    #[tokio::test]
    async fn sign_out_clears_the_shell() {
        let harness = Harness::new(vec![]).await;
        harness.sign_in_demo().await;
        let mut shell = Shell::new(harness.state.clone());
        shell.sync_auth().await.unwrap();
        shell.navigate(View::Deadlines).unwrap();

        shell.sign_out().await.unwrap();

        assert_eq!(shell.view(), View::Dashboard);
        assert!(shell.profile().is_none());
        assert!(harness.state.backend.auth().get_session().await.is_none());
    }
}
