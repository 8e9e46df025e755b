pub mod controller;
pub mod history;
pub mod state_machine;
pub mod step;


pub use controller::{
    CleanupView, LaunchStatus, MergeView, RefreshJobView, TaskStatus, WizardController,
    WizardSettings, WizardView,
};
pub use history::{History, MemoryHistory};
pub use state_machine::{RefreshState, Transition};
pub use step::WizardStep;
