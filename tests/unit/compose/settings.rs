use super::*;
use crate::engine::api::DiagnosticSeverity;

#[test]
fn empty_json_yields_defaults() {
    let s = CompositeSettings::from_json_str("{}").unwrap();
    assert_eq!(s, CompositeSettings::default());
    assert_eq!(s.diagnostics.severity, DiagnosticSeverity::Warnings);
    assert!(s.diagnostics.all_ranks);
}

#[test]
fn partial_json_overrides_fields() {
    let s = CompositeSettings::from_json_str(
        r#"{ "single_image_strategy": "direct", "background": [1.0, 1.0, 1.0, 1.0] }"#,
    )
    .unwrap();
    assert_eq!(s.single_image_strategy, SingleImageStrategy::Direct);
    assert_eq!(s.strategy, Strategy::Sequential);
    assert_eq!(s.background, [1.0; 4]);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = CompositeSettings::from_json_str(r#"{ "tiles": 4 }"#).unwrap_err();
    assert!(matches!(err, CompositeError::Validation(_)));
}

#[test]
fn only_blend_pipelines_are_ordered() {
    let s = CompositeSettings::default();
    assert!(s.pipeline(MergeMode::Blend).ordered);
    assert!(!s.pipeline(MergeMode::ZBuffer).ordered);
    assert_eq!(s.pipeline(MergeMode::ZBuffer).background, [0.0; 4]);
}
