mod bail;
mod retry;
mod shutdown;

pub mod prelude {
    pub use crate::bail::AgentBailError;
    pub use crate::retry::{with_retries, RetriesExhausted};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
