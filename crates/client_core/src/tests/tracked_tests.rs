use super::*;

#[derive(Debug, Clone, PartialEq)]
struct Record {
    name: String,
    status: bool,
}

fn record() -> Record {
    Record {
        name: "anything".into(),
        status: true,
    }
}

#[test]
fn fresh_server_record_has_no_changes() {
    let tracked = Tracked::from_server(record());
    assert!(tracked.original().is_some());
    assert!(!tracked.has_changes());
    assert_eq!(tracked.changed(|r| &r.name), None);
}

#[test]
fn only_modified_fields_are_reported() {
    let mut tracked = Tracked::from_server(record());
    tracked.get_mut().status = false;
    assert!(tracked.has_changes());
    assert_eq!(tracked.changed(|r| &r.status), Some(&false));
    assert_eq!(tracked.changed(|r| &r.name), None);
    assert_eq!(tracked.changed(|r| r.name.as_str()), None);
}

#[test]
fn unpersisted_record_reports_every_field() {
    let tracked = Tracked::new(record());
    assert!(tracked.original().is_none());
    assert!(tracked.has_changes());
    assert_eq!(tracked.changed(|r| &r.name).map(String::as_str), Some("anything"));
}

#[test]
fn reverting_an_edit_clears_the_change() {
    let mut tracked = Tracked::from_server(record());
    tracked.get_mut().name = "renamed".into();
    assert_eq!(tracked.changed(|r| &r.name).map(String::as_str), Some("renamed"));
    tracked.get_mut().name = "anything".into();
    assert!(!tracked.has_changes());
    assert_eq!(tracked.original().map(|r| r.name.as_str()), Some("anything"));
}
