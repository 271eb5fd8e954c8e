//! Drives every configured mapping to convergence: fetch, reconcile, execute, persist
//!
//! Mappings run strictly sequentially and fail-fast by default: the first mapping that errors
//! stops the run and its error is returned to the caller (the CLI binary maps this to an exit
//! code). A busy-mode mapping actually drives two reconcilers per run, mirroring the way the
//! original prototype paired a one-way busy mirror with a one-way "real events" companion flowing
//! back upstream.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;

use crate::backend::caldav::CaldavBackend;
use crate::backend::google::GoogleBackend;
use crate::backend::Backend;
use crate::config::{Account, Config, Mode};
use crate::error::{Result, SyncError};
use crate::reconcile::{busy, full, full_oneway};
use crate::state::{self, StateMode};

pub struct Orchestrator {
    config: Config,
    backends: HashMap<String, Box<dyn Backend>>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Result<Self> {
        let mut backends: HashMap<String, Box<dyn Backend>> = HashMap::new();
        for account in config.accounts.values() {
            let backend: Box<dyn Backend> = match account {
                Account::Caldav { name, url, username, .. } => {
                    let password = config.passwords.get(name).cloned().unwrap_or_default();
                    Box::new(CaldavBackend::new(name.clone(), url, username.clone(), password)?)
                }
                Account::Google { name, credentials_path, token_path } => {
                    Box::new(GoogleBackend::new(name.clone(), credentials_path.clone(), token_path.clone()))
                }
            };
            backends.insert(account.name().to_string(), backend);
        }

        Ok(Self { config, backends })
    }

    fn backend(&self, account: &str) -> Result<&dyn Backend> {
        self.backends
            .get(account)
            .map(|b| b.as_ref())
            .ok_or_else(|| SyncError::AccountNotFound(account.to_string()))
    }

    fn state_path(&self, identity: &str) -> PathBuf {
        self.config.state_dir.join(format!("{}.json", identity))
    }

    /// Run every configured mapping once. Returns the first error encountered, if any.
    pub async fn run(&self) -> Result<()> {
        for mapping in &self.config.mappings {
            log::info!(
                "[{}:{} -> {}:{}] mode={:?}",
                mapping.source.account, mapping.source.calendar, mapping.target.account, mapping.target.calendar, mapping.mode
            );

            match mapping.mode {
                Mode::Full => self.run_full(mapping).await?,
                Mode::Busy => {
                    self.run_busy(mapping).await?;
                    self.run_full_oneway_companion(mapping).await?;
                }
            }
        }
        Ok(())
    }

    async fn run_full(&self, mapping: &crate::config::Mapping) -> Result<()> {
        let source = self.backend(&mapping.source.account)?;
        let target = self.backend(&mapping.target.account)?;
        let source_cal = source.resolve_calendar(&mapping.source.calendar).await?;
        let target_cal = target.resolve_calendar(&mapping.target.calendar).await?;

        let path = self.state_path(&mapping.identity(Mode::Full));
        let prev = state::load(&path, StateMode::Full);

        let source_events = source.fetch_events(&source_cal).await?;
        let target_events = target.fetch_events(&target_cal).await?;

        let plan = full::reconcile(prev.as_ref(), &source_events, &target_events);
        crate::executor::execute(&plan.actions, source, target, &source_cal, &target_cal).await?;
        state::store(&path, &plan.next_state)?;
        log::info!("full sync applied {} actions", plan.actions.len());
        Ok(())
    }

    async fn run_busy(&self, mapping: &crate::config::Mapping) -> Result<()> {
        let source = self.backend(&mapping.source.account)?;
        let target = self.backend(&mapping.target.account)?;
        let source_cal = source.resolve_calendar(&mapping.source.calendar).await?;
        let target_cal = target.resolve_calendar(&mapping.target.calendar).await?;

        let path = self.state_path(&mapping.identity(Mode::Busy));
        let prev = state::load(&path, StateMode::Busy);

        let source_events = source.fetch_events(&source_cal).await?;
        let target_events = target.fetch_events(&target_cal).await?;

        let plan = busy::reconcile(prev.as_ref(), &source_events, &target_events, Utc::now());
        crate::executor::execute(&plan.actions, source, target, &source_cal, &target_cal).await?;
        state::store(&path, &plan.next_state)?;
        log::info!("busy sync applied {} actions", plan.actions.len());
        Ok(())
    }

    /// The companion reconciler: replicates real (non-Busy) events created on the mirror target
    /// back to the original source, with source and target swapped relative to `run_busy`.
    async fn run_full_oneway_companion(&self, mapping: &crate::config::Mapping) -> Result<()> {
        let swapped_source = self.backend(&mapping.target.account)?;
        let swapped_target = self.backend(&mapping.source.account)?;
        let swapped_source_cal = swapped_source.resolve_calendar(&mapping.target.calendar).await?;
        let swapped_target_cal = swapped_target.resolve_calendar(&mapping.source.calendar).await?;

        let path = self.state_path(&mapping.companion_identity());
        let prev = state::load(&path, StateMode::FullOneway);

        let source_events = swapped_source.fetch_events(&swapped_source_cal).await?;
        let target_events = swapped_target.fetch_events(&swapped_target_cal).await?;

        let plan = full_oneway::reconcile(prev.as_ref(), &source_events, &target_events);
        crate::executor::execute(&plan.actions, swapped_source, swapped_target, &swapped_source_cal, &swapped_target_cal).await?;
        state::store(&path, &plan.next_state)?;
        log::info!("full_oneway companion sync applied {} actions", plan.actions.len());
        Ok(())
    }
}
