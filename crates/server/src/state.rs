use std::sync::Arc;

use deskrelay_core::{
    BulkJobRunner, Config, HelpdeskApi, JobRegistry, ProfileSource, SanitizedConfig, TicketLog,
};

/// Shared application state
pub struct AppState {
    config: Config,
    profiles: Arc<dyn ProfileSource>,
    desk: Arc<dyn HelpdeskApi>,
    ticket_log: Arc<dyn TicketLog>,
    runner: BulkJobRunner,
}

impl AppState {
    pub fn new(
        config: Config,
        profiles: Arc<dyn ProfileSource>,
        desk: Arc<dyn HelpdeskApi>,
        ticket_log: Arc<dyn TicketLog>,
        runner: BulkJobRunner,
    ) -> Self {
        Self {
            config,
            profiles,
            desk,
            ticket_log,
            runner,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn profiles(&self) -> &dyn ProfileSource {
        self.profiles.as_ref()
    }

    pub fn desk(&self) -> &dyn HelpdeskApi {
        self.desk.as_ref()
    }

    pub fn ticket_log(&self) -> &dyn TicketLog {
        self.ticket_log.as_ref()
    }

    pub fn runner(&self) -> &BulkJobRunner {
        &self.runner
    }

    pub fn registry(&self) -> &JobRegistry {
        self.runner.registry()
    }
}
