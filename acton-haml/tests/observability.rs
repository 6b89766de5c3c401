//! Global subscriber installation
//!
//! Kept in its own test binary so the installed subscriber does not capture
//! output from other tests.

#[test]
fn test_init_only_once() {
    assert!(acton_haml::observability::init().is_ok());
    assert!(acton_haml::observability::init().is_err());
}
