pub mod config;
pub mod error;
pub mod services;
pub mod share;
pub mod sink;
pub mod workflow;

pub use config::{load_settings, load_settings_from, ClientSettings};
pub use error::{SettingsError, WorkflowError};
pub use services::{AssetHost, CardRenderer, FortuneService, HttpServices, ImageFetcher};
pub use share::{ShareIntent, ShareTemplate};
pub use sink::{DirectorySink, ImageSink};
pub use workflow::{
    Phase, SubmitOutcome, WorkflowController, WorkflowDependencies, WorkflowEvent, WorkflowState,
};
