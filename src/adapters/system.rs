//! Chip reset adapter, implementing [`SystemPort`].

use log::error;

use crate::app::ports::SystemPort;

#[derive(Debug, Default)]
pub struct SystemAdapter;

impl SystemPort for SystemAdapter {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self) -> ! {
        error!("System: restarting");
        esp_idf_svc::hal::reset::restart()
    }

    /// Simulation: a host process has nothing to reboot into, so it exits.
    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) -> ! {
        error!("System(sim): restart requested, exiting");
        std::process::exit(3)
    }
}
