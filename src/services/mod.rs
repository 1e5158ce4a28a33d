pub mod access;
pub mod auth;
pub mod file;
pub mod recorder;
pub mod settings;
pub mod share;

pub use access::{AccessService, VisitContext};
pub use auth::AuthService;
pub use file::FileService;
pub use recorder::{AccessEvent, AccessRecorder};
pub use settings::{SettingsCache, SettingsService};
pub use share::ShareService;
