pub mod config;
pub mod desk;
pub mod history;
pub mod jobs;
pub mod metrics;
pub mod profile;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use desk::{DeskClient, DeskConfig, DeskError, HelpdeskApi, HttpHelpdesk, TokenCache};
pub use history::{SqliteTicketLog, TicketLog, TicketRecord};
pub use jobs::{
    BulkJobRunner, EventEmitter, JobEvent, JobKey, JobRegistry, JobStatus, JobsConfig,
    StartBulkJob, VerificationPool,
};
pub use profile::{Profile, ProfileSource, StaticProfiles};
