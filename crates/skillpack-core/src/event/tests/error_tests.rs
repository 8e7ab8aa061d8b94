#![cfg(test)]

use std::str::FromStr;

use crate::event::error::EventSystemError;
use crate::event::PluginEventKind;

#[test]
fn test_event_system_error_display() {
    let failed = EventSystemError::HandlerFailed {
        event_name: "install".to_string(),
        handler_id: 3,
        reason: "disk full".to_string(),
    };
    assert_eq!(format!("{}", failed), "Handler 3 for event 'install' failed: disk full");

    let panicked = EventSystemError::HandlerPanicked {
        event_name: "activate".to_string(),
        handler_id: 7,
        message: "boom".to_string(),
    };
    assert_eq!(format!("{}", panicked), "Handler 7 for event 'activate' panicked: boom");
}

#[test]
fn test_event_kind_names_round_trip() {
    for kind in PluginEventKind::ALL {
        assert_eq!(PluginEventKind::from_str(kind.as_str()).unwrap(), kind);
    }
    assert!(matches!(
        PluginEventKind::from_str("reboot"),
        Err(EventSystemError::UnknownEvent(name)) if name == "reboot"
    ));
}
