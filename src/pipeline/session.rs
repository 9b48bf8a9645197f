use crate::types::ProviderChoice;

/// Per-chapter pipeline switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterOptions {
    /// Run the polish pass after drafting.
    pub polish: bool,
    /// Extract continuity memory from the draft.
    pub extract_memory: bool,
}

impl Default for ChapterOptions {
    fn default() -> Self {
        Self {
            polish: false,
            extract_memory: true,
        }
    }
}

/// Caller-owned selection state: which provider to use and how chapters run.
///
/// Each caller holds its own context, so concurrent operations never share a
/// mutable "current provider".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub choice: ProviderChoice,
    pub options: ChapterOptions,
}

impl SessionContext {
    pub fn new(choice: ProviderChoice) -> Self {
        Self {
            choice,
            options: ChapterOptions::default(),
        }
    }

    pub fn with_choice(mut self, choice: ProviderChoice) -> Self {
        self.choice = choice;
        self
    }

    pub fn with_polish(mut self, polish: bool) -> Self {
        self.options.polish = polish;
        self
    }

    pub fn with_memory_extraction(mut self, enabled: bool) -> Self {
        self.options.extract_memory = enabled;
        self
    }
}
