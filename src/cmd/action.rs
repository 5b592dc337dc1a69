/*!
Autonomous agent actions (`shadow agent <action>`).

Each action maps to `POST /autonomous/<action>` on the bridge.
*/

use std::fmt;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AgentAction {
    /// Start the autonomous agent loop
    Start,
    /// Stop the loop
    Stop,
    /// Show loop state, agents, task queue and recent builds
    Status,
    /// Scan projects for new work
    Scan,
    /// Pause without losing queue state
    Pause,
    /// Resume a paused loop
    Resume,
}

impl AgentAction {
    pub const fn all() -> &'static [AgentAction] {
        &[
            AgentAction::Start,
            AgentAction::Stop,
            AgentAction::Status,
            AgentAction::Scan,
            AgentAction::Pause,
            AgentAction::Resume,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentAction::Start => "start",
            AgentAction::Stop => "stop",
            AgentAction::Status => "status",
            AgentAction::Scan => "scan",
            AgentAction::Pause => "pause",
            AgentAction::Resume => "resume",
        }
    }

    /// Bridge path relative to the API base.
    pub fn endpoint(&self) -> String {
        format!("/autonomous/{}", self.as_str())
    }

    /// Whether the reply is rendered as a status report rather than a message.
    pub fn is_report(&self) -> bool {
        matches!(self, AgentAction::Status)
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::AgentAction;

    #[test]
    fn endpoints() {
        assert_eq!(AgentAction::Start.endpoint(), "/autonomous/start");
        assert_eq!(AgentAction::Resume.endpoint(), "/autonomous/resume");
        let paths: Vec<String> = AgentAction::all().iter().map(|a| a.endpoint()).collect();
        assert_eq!(paths.len(), 6);
        assert!(paths.contains(&"/autonomous/scan".to_string()));
    }

    #[test]
    fn only_status_is_a_report() {
        assert!(AgentAction::Status.is_report());
        assert!(!AgentAction::Pause.is_report());
    }

    #[test]
    fn display_matches_cli_name() {
        assert_eq!(AgentAction::Pause.to_string(), "pause");
    }
}
