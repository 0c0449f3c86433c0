use crate::orchestrator::TaskId;

pub type Result<T> = core::result::Result<T, Error>;

/// Setup-time failures. The running loops never produce errors: missed
/// deadlines and silent co-processors degrade instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error("could not create the {0:?} task")]
    Spawn(TaskId),
    #[error("task set already started")]
    AlreadyStarted,
    #[error("task set was never started")]
    NotStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_names_the_task() {
        let msg = format!("{}", Error::Spawn(TaskId::Mixer));
        assert_eq!(msg, "could not create the Mixer task");
    }
}
