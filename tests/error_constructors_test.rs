use stepcharge::error::StepChargeError;

#[test]
fn error_constructors() {
    assert!(matches!(
        StepChargeError::config("x"),
        StepChargeError::Config { .. }
    ));
    assert!(matches!(
        StepChargeError::validation("f", "m"),
        StepChargeError::Validation { .. }
    ));
    assert!(matches!(
        StepChargeError::missing("wired.current"),
        StepChargeError::Missing { .. }
    ));
    assert!(matches!(StepChargeError::io("x"), StepChargeError::Io { .. }));
}

#[test]
fn table_errors_display() {
    let err = StepChargeError::out_of_range("direct.current", 4, 3);
    assert_eq!(
        err.to_string(),
        "Index out of range in direct.current: index 4, size 3"
    );
    assert!(!err.is_config());
    assert!(StepChargeError::shape_mismatch("wired.vfloat", 3, 2).is_config());
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: StepChargeError = io.into();
    assert!(err.to_string().starts_with("I/O error"));
}
