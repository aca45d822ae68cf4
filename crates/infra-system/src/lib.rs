// Pix-Star Supervisor Infrastructure - System Adapters
// Implements: ProcessControl, HandleStore, WorkerSpawner + config staging

pub mod config_provisioner;
pub mod handle_store;
pub mod process_control;
pub mod spawner;
pub mod virtualenv;

pub use config_provisioner::{ConfigProvisioner, ProvisionError, ProvisionReport};
pub use handle_store::FileHandleStore;
pub use process_control::SystemProcessControl;
pub use spawner::DetachedSpawner;
#[cfg(unix)]
pub use spawner::exec_foreground;
pub use virtualenv::VirtualEnv;
