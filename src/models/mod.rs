pub mod file;
pub mod settings;
pub mod share;
pub mod user;

pub use file::*;
pub use settings::*;
pub use share::*;
pub use user::*;
