pub mod commands;
pub mod progress;
pub mod ui;
pub mod util;

pub use progress::{ConsoleRenderer, ProgressState, ProgressTracker};
pub use util::{CommandContext, ModelArgs, RepoArgs};
