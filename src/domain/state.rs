use crate::domain::model::InstanceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Start,
    Stop,
    Reboot,
    Destroy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Reboot => "reboot",
            Action::Destroy => "destroy",
        }
    }

    pub fn parse(name: &str) -> Option<Action> {
        match name {
            "create" => Some(Action::Create),
            "start" => Some(Action::Start),
            "stop" => Some(Action::Stop),
            "reboot" => Some(Action::Reboot),
            "destroy" => Some(Action::Destroy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Transition {
    from: InstanceState,
    to: InstanceState,
    /// `None` marks an automatic transition.
    on: Option<Action>,
}

/// Instance lifecycle as a driver sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMachine {
    transitions: Vec<Transition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, from: InstanceState, action: Action, to: InstanceState) -> Self {
        self.transitions.push(Transition {
            from,
            to,
            on: Some(action),
        });
        self
    }

    pub fn automatically(mut self, from: InstanceState, to: InstanceState) -> Self {
        self.transitions.push(Transition { from, to, on: None });
        self
    }

    /// START -create-> PENDING -> RUNNING -stop-> STOPPING -> STOPPED -destroy-> FINISHED
    pub fn standard() -> Self {
        Self::new()
            .on(InstanceState::Start, Action::Create, InstanceState::Pending)
            .automatically(InstanceState::Pending, InstanceState::Running)
            .on(InstanceState::Running, Action::Reboot, InstanceState::Running)
            .on(InstanceState::Running, Action::Stop, InstanceState::Stopping)
            .automatically(InstanceState::Stopping, InstanceState::Stopped)
            .on(InstanceState::Stopped, Action::Start, InstanceState::Running)
            .on(InstanceState::Stopped, Action::Destroy, InstanceState::Finished)
    }

    pub fn actions_for(&self, state: InstanceState) -> Vec<Action> {
        let mut actions = Vec::new();
        for t in &self.transitions {
            if t.from == state {
                if let Some(action) = t.on {
                    if !actions.contains(&action) {
                        actions.push(action);
                    }
                }
            }
        }
        actions
    }

    pub fn allows(&self, state: InstanceState, action: Action) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from == state && t.on == Some(action))
    }

    /// Applies `action` and then follows automatic transitions until the
    /// machine settles. Returns `None` when the action is not allowed.
    pub fn next(&self, state: InstanceState, action: Action) -> Option<InstanceState> {
        let mut current = self
            .transitions
            .iter()
            .find(|t| t.from == state && t.on == Some(action))?
            .to;

        // A self-loop on an automatic edge would never settle.
        let mut hops = 0;
        while let Some(t) = self
            .transitions
            .iter()
            .find(|t| t.from == current && t.on.is_none())
        {
            if t.to == current || hops > self.transitions.len() {
                break;
            }
            current = t.to;
            hops += 1;
        }
        Some(current)
    }
}
