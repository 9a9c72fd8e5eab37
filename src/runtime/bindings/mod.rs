#[macro_use]
mod macros;

mod app_info;
mod console;
mod events;
mod file_system;
mod timers;

// Re-export setup functions
pub use app_info::setup_app_info;
pub use console::setup_console;
pub use events::setup_events;
pub use file_system::setup_file_system;
pub use timers::setup_timers;
