use serde::{Deserialize, Serialize};

/// A responder's answer to a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Coming,
    NotComing,
    Later,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::Coming, Choice::NotComing, Choice::Later];

    /// Maps the action part of a button id (`come_yes`, `come_no`, `come_late`).
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "yes" => Some(Choice::Coming),
            "no" => Some(Choice::NotComing),
            "late" => Some(Choice::Later),
            _ => None,
        }
    }
}

/// Response sets of one record. A responder is in at most one set.
///
/// Sets keep first-response order so a rendered notice lists people in the
/// order they answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RsvpState {
    coming: Vec<String>,
    not_coming: Vec<String>,
    later: Vec<String>,
}

impl RsvpState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `choice` for `responder`, dropping any earlier answer.
    ///
    /// Re-applying the current choice leaves the state untouched, including
    /// the responder's position in the list.
    pub fn set(&mut self, responder: &str, choice: Choice) {
        if self.choice_of(responder) == Some(choice) {
            return;
        }
        for c in Choice::ALL {
            self.set_mut(c).retain(|r| r != responder);
        }
        self.set_mut(choice).push(responder.to_string());
    }

    pub fn choice_of(&self, responder: &str) -> Option<Choice> {
        Choice::ALL
            .into_iter()
            .find(|c| self.responders(*c).iter().any(|r| r == responder))
    }

    pub fn responders(&self, choice: Choice) -> &[String] {
        match choice {
            Choice::Coming => &self.coming,
            Choice::NotComing => &self.not_coming,
            Choice::Later => &self.later,
        }
    }

    pub fn coming(&self) -> &[String] {
        &self.coming
    }

    pub fn not_coming(&self) -> &[String] {
        &self.not_coming
    }

    pub fn later(&self) -> &[String] {
        &self.later
    }

    pub fn len(&self) -> usize {
        self.coming.len() + self.not_coming.len() + self.later.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_mut(&mut self, choice: Choice) -> &mut Vec<String> {
        match choice {
            Choice::Coming => &mut self.coming,
            Choice::NotComing => &mut self.not_coming,
            Choice::Later => &mut self.later,
        }
    }
}
