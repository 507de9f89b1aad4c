use crate::resolve::Origin;

/// Which manifest group a module was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleGroup {
    Helper,
    Launcher,
    Feature,
}

impl ModuleGroup {
    pub fn label(self) -> &'static str {
        match self {
            ModuleGroup::Helper => "helper",
            ModuleGroup::Launcher => "launcher",
            ModuleGroup::Feature => "module",
        }
    }
}

/// Outcome for one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Resolved and executed; records which tier supplied the source.
    Loaded(Origin),
    /// All three resolution tiers came up empty.
    Unavailable,
    /// Resolved, but execution failed.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ModuleOutcome {
    pub name: String,
    pub group: ModuleGroup,
    pub status: ModuleStatus,
}

/// What one load attempt did, entry by entry, in execution order.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub outcomes: Vec<ModuleOutcome>,
}

impl LoadReport {
    pub fn loaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ModuleStatus::Loaded(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.loaded()
    }

    /// Status recorded for `name`. With duplicate names the last outcome wins.
    pub fn status_of(&self, name: &str) -> Option<&ModuleStatus> {
        self.outcomes
            .iter()
            .rev()
            .find(|o| o.name == name)
            .map(|o| &o.status)
    }
}
