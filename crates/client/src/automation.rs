//! Canned prompts run over collaborator input.

use std::{fmt, str::FromStr};

/// The built-in automations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutomationKind {
    /// Write unit tests for the input code.
    GenerateTests,
    /// Write documentation for the input code.
    CreateDocs,
    /// Suggest refactorings.
    RefactorCode,
    /// Look for vulnerabilities.
    SecurityScan,
}

/// One entry of the automation table.
#[derive(Debug, PartialEq, Eq)]
pub struct Automation {
    /// The kind this entry describes.
    pub kind: AutomationKind,
    /// Stable identifier used on the command line.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Preamble placed before the input.
    pub instruction: &'static str,
}

// Indexed by `AutomationKind as usize`.
static AUTOMATIONS: [Automation; 4] = [
    Automation {
        kind: AutomationKind::GenerateTests,
        id: "generate_tests",
        name: "Generate Unit Tests",
        description: "Generate unit tests for the code",
        instruction: "Write thorough unit tests for the following code. \
            Cover normal cases, edge cases and error handling, \
            and use the testing conventions of its language.",
    },
    Automation {
        kind: AutomationKind::CreateDocs,
        id: "create_docs",
        name: "Create Documentation",
        description: "Write documentation for the code",
        instruction: "Write clear documentation for the following code. \
            Describe its purpose, its public interface and usage examples.",
    },
    Automation {
        kind: AutomationKind::RefactorCode,
        id: "refactor_code",
        name: "Refactor Code",
        description: "Suggest refactorings that improve the code",
        instruction: "Refactor the following code for readability and \
            maintainability without changing its behaviour. \
            Explain each change briefly.",
    },
    Automation {
        kind: AutomationKind::SecurityScan,
        id: "security_scan",
        name: "Security Scan",
        description: "Scan the code for vulnerabilities",
        instruction: "Review the following code for security vulnerabilities. \
            For each finding give the location, the risk and a fix.",
    },
];

impl AutomationKind {
    /// Every kind, in table order.
    pub const ALL: [Self; 4] = [
        Self::GenerateTests,
        Self::CreateDocs,
        Self::RefactorCode,
        Self::SecurityScan,
    ];

    /// The table entry for this kind.
    pub fn automation(self) -> &'static Automation {
        &AUTOMATIONS[self as usize]
    }

    /// Stable identifier.
    pub fn id(self) -> &'static str {
        self.automation().id
    }
}

impl fmt::Display for AutomationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// An automation id that is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown automation '{0}'")]
pub struct UnknownAutomation(pub String);

impl FromStr for AutomationKind {
    type Err = UnknownAutomation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().replace('-', "_").to_ascii_lowercase();
        AUTOMATIONS
            .iter()
            .find(|automation| automation.id == id)
            .map(|automation| automation.kind)
            .ok_or_else(|| UnknownAutomation(s.to_owned()))
    }
}

impl Automation {
    /// The whole table.
    pub fn all() -> &'static [Automation] {
        &AUTOMATIONS
    }

    /// The entry for `kind`.
    pub fn get(kind: AutomationKind) -> &'static Automation {
        kind.automation()
    }

    /// The full prompt for `input`.
    pub fn prompt(&self, input: &str) -> String {
        format!("{}\n\n{input}", self.instruction)
    }
}
