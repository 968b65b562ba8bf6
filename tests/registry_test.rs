// ABOUTME: Integration tests for the adapter registry and its form schemas
// ABOUTME: Verifies lookup, platform id parsing, and declarative config fields

mod common;

use schulsync::config::EngineConfig;
use schulsync::providers::{global_registry, AdapterRegistry, PlatformId};

#[test]
fn test_every_platform_resolves_to_its_adapter() {
    common::init_test_logging();
    let registry = AdapterRegistry::new(&EngineConfig::default());
    for id in PlatformId::ALL {
        let adapter = registry.get(id).expect("adapter registered");
        assert_eq!(adapter.id(), id);
    }
}

#[test]
fn test_platform_ids_parse_from_wire_strings() {
    for (raw, expected) in [
        ("webuntis", PlatformId::WebUntis),
        ("iserv", PlatformId::IServ),
        ("schulmanager", PlatformId::Schulmanager),
        ("moodle", PlatformId::Moodle),
        ("sdui", PlatformId::Sdui),
    ] {
        assert_eq!(raw.parse::<PlatformId>().unwrap(), expected);
    }
    assert!("teams".parse::<PlatformId>().is_err());
}

#[test]
fn test_self_hosted_platforms_require_an_instance_url() {
    for id in [PlatformId::IServ, PlatformId::Moodle] {
        let fields = AdapterRegistry::config_fields(id);
        assert!(
            fields.iter().any(|f| f.key == "url" && f.required),
            "{id} must ask for its instance URL"
        );
    }
}

#[test]
fn test_webuntis_schema_names_server_and_school() {
    let fields = AdapterRegistry::config_fields(PlatformId::WebUntis);
    assert!(fields.iter().any(|f| f.key == "server" && f.required));
    assert!(fields.iter().any(|f| f.key == "school" && f.required));
    assert!(fields.iter().any(|f| f.key == "student_id" && !f.required));
}

#[test]
fn test_schema_fields_carry_ui_text() {
    for id in PlatformId::ALL {
        for field in AdapterRegistry::config_fields(id) {
            assert!(!field.label.is_empty());
            assert!(!field.help.is_empty());
        }
    }
}

#[test]
fn test_global_registry_supports_all_platforms() {
    let registry = global_registry();
    assert_eq!(registry.supported_platforms(), PlatformId::ALL.to_vec());
}
