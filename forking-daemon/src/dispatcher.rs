use crate::process::{ChildRegistry, WorkerSpawner};
use crate::state::TerminationFlag;
use forking_protocol::{ControlCommand, ControlResponse};
use log::{error, info, warn};

/// Maps one request line to an action and the line to answer with.
///
/// Never fails: anything unexpected becomes a `FAILURE` response.
pub struct CommandDispatcher {
    spawner: WorkerSpawner,
    termination: TerminationFlag,
}

impl CommandDispatcher {
    pub fn new(spawner: WorkerSpawner, termination: TerminationFlag) -> Self {
        Self {
            spawner,
            termination,
        }
    }

    /// Handles a request.
    ///
    /// # Arguments
    ///
    /// * `line` - The raw request line.
    /// * `registry` - Receives the handle of a successfully forked worker.
    pub fn dispatch(&self, line: &str, registry: &mut ChildRegistry) -> ControlResponse {
        let command = match line.parse::<ControlCommand>() {
            Ok(command) => command,
            Err(e) => {
                warn!("Dispatcher: rejected {:?}: {}", line.trim_end(), e);
                return ControlResponse::failure(e);
            }
        };

        match command {
            ControlCommand::Hello => ControlResponse::Alive,
            ControlCommand::Quit => {
                if self.termination.request() {
                    info!("Dispatcher: quit requested");
                }
                ControlResponse::Quitting
            }
            ControlCommand::Fork { argument } => match self.spawner.spawn(argument) {
                Ok(handle) => {
                    let directory = handle.directory().to_path_buf();
                    registry.register(handle);
                    ControlResponse::Forked(directory)
                }
                Err(e) => {
                    error!("Dispatcher: fork {} failed: {}", argument, e);
                    ControlResponse::failure(format!("fork failed: {}", e))
                }
            },
        }
    }
}
