//! Tests for the automation table.

use aistudio_client::{Automation, AutomationKind};

#[test]
fn table_matches_kinds() {
    assert_eq!(Automation::all().len(), AutomationKind::ALL.len());
    for kind in AutomationKind::ALL {
        assert_eq!(Automation::get(kind).kind, kind);
    }
}

#[test]
fn parses_ids() {
    assert_eq!(
        "generate_tests".parse::<AutomationKind>().unwrap(),
        AutomationKind::GenerateTests
    );
    assert_eq!(
        "security-scan".parse::<AutomationKind>().unwrap(),
        AutomationKind::SecurityScan
    );
    for kind in AutomationKind::ALL {
        assert_eq!(kind.to_string().parse::<AutomationKind>().unwrap(), kind);
    }
}

#[test]
fn unknown_id_is_an_error() {
    let err = "translate".parse::<AutomationKind>().unwrap_err();
    assert_eq!(err.to_string(), "unknown automation 'translate'");
}

#[test]
fn prompt_puts_instruction_first() {
    let automation = AutomationKind::CreateDocs.automation();
    let prompt = automation.prompt("struct Foo;");
    assert!(prompt.starts_with(automation.instruction));
    assert!(prompt.ends_with("\n\nstruct Foo;"));
}
