/// Return this error from an agent's behaviour function to indicate that the agent is bailing.
///
/// This should be used when an agent hits a problem that is fatal for that agent but not for the
/// scenario. For example, if the agent could not build its HTTP client then it stops, while the
/// other agents carry on generating traffic.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct AgentBailError {
    msg: String,
}

impl AgentBailError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for AgentBailError {
    fn default() -> Self {
        Self {
            msg: "Agent is bailing".to_string(),
        }
    }
}
