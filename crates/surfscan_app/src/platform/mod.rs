mod app;
mod config;
mod effects;
mod persistence;
mod protocol;
mod stdio_tabs;

use surfscan_core::Msg;

pub use app::run_app;

/// Everything the dispatcher loop reacts to.
#[derive(Debug)]
pub(crate) enum HostEvent {
    Msg(Msg),
    /// The shim closed stdin.
    Shutdown,
}
