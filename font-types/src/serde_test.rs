//! ensure serde is working as expected

use super::*;

#[test]
fn test_serde() {
    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq, Eq)]
    struct Everything {
        fixed: Fixed,
        f2dot14: F2Dot14,
        u24: Uint24,
        i24: Int24,
        format: Format,
        record: Record,
        span: Span,
        severity: Severity,
    }

    let my_instance = Everything {
        fixed: Fixed::from_f64(521.5),
        f2dot14: F2Dot14::from_f64(1.2),
        u24: Uint24::new(16_777_215),
        i24: Int24::new(-5),
        format: Format::parse("2H x F").unwrap(),
        record: Record::new(vec![Value::Int(7), Value::Fixed(Fixed::ONE)]),
        span: [1..=4, 9..=12].into_iter().collect(),
        severity: Severity::Warning,
    };

    let dumped = serde_json::to_string(&my_instance).unwrap();
    let loaded: Everything = serde_json::from_str(&dumped).unwrap();
    assert_eq!(my_instance, loaded)
}
