use super::*;
use crate::chain::step::{ConditionalStep, DoubleSizeStep, Lut3dStep};
use crate::device::shaders::LutMode;

const SAMPLE: &str = r#"{
  "name": "sharp",
  "steps": [
    { "kind": "double_size" },
    { "kind": "conditional", "condition": "hdr && input.width < 1920",
      "steps": [{ "kind": "lut3d", "size": 9, "mode": "channel_swap" }] },
    { "kind": "preset", "name": "finish" }
  ],
  "presets": {
    "finish": [{ "kind": "resize", "width": 64, "height": 32 }]
  },
  "upscaler": "nearest"
}"#;

#[test]
fn parses_a_full_script() {
    let config = ScriptConfig::from_json_str(SAMPLE).unwrap();
    assert_eq!(config.name, "sharp");
    assert_eq!(config.steps.len(), 3);
    assert_eq!(config.steps[0], ChainStep::DoubleSize(DoubleSizeStep { force: false }));
    assert_eq!(
        config.steps[1],
        ChainStep::Conditional(ConditionalStep {
            condition: "hdr && input.width < 1920".to_owned(),
            steps: vec![ChainStep::Lut3d(Lut3dStep {
                size: 9,
                mode: LutMode::ChannelSwap,
            })],
        })
    );
    assert_eq!(config.preset_registry().names().collect::<Vec<_>>(), vec!["finish"]);
    assert_eq!(config.scalers().upscaler, ScalerKind::Nearest);
    assert_eq!(config.scalers().downscaler, ScalerKind::Bilinear);
}

#[test]
fn missing_sections_take_defaults() {
    let config = ScriptConfig::from_json_str(r#"{ "name": "plain" }"#).unwrap();
    assert!(config.steps.is_empty());
    assert!(config.presets.is_empty());
    assert_eq!(config.pool, PoolOpts::default());
    assert_eq!(config.scalers(), ScalerSettings::default());
}

#[test]
fn pool_options_are_read() {
    let config = ScriptConfig::from_json_str(
        r#"{ "name": "p", "pool": { "max_textures_per_bucket": 2, "max_idle_frames": 5 } }"#,
    )
    .unwrap();
    assert_eq!(config.pool.max_textures_per_bucket, 2);
    assert_eq!(config.pool.max_idle_frames, 5);
    assert_eq!(config.pool.max_pool_bytes, PoolOpts::default().max_pool_bytes);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = ScriptConfig::from_json_str(r#"{ "name": "x", "stpes": [] }"#).unwrap_err();
    assert!(err.to_string().contains("stpes"), "{err}");
}

#[test]
fn unknown_step_kind_is_rejected() {
    let err =
        ScriptConfig::from_json_str(r#"{ "name": "x", "steps": [{ "kind": "sharpen" }] }"#)
            .unwrap_err();
    assert!(err.to_string().contains("parse script config"), "{err}");
}

#[test]
fn empty_name_is_rejected() {
    let err = ScriptConfig::from_json_str(r#"{ "name": "  " }"#).unwrap_err();
    assert!(err.to_string().contains("name"), "{err}");
}

#[test]
fn zero_bucket_size_is_rejected() {
    let err = ScriptConfig::from_json_str(
        r#"{ "name": "x", "pool": { "max_textures_per_bucket": 0 } }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("max_textures_per_bucket"), "{err}");
}

#[test]
fn malformed_condition_is_rejected_even_when_nested() {
    let err = ScriptConfig::from_json_str(
        r#"{ "name": "x", "presets": { "p": [
            { "kind": "conditional", "condition": "true", "steps": [
                { "kind": "conditional", "condition": "input.width <", "steps": [] }
            ] }
        ] } }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("input.width <"), "{err}");
}

#[test]
fn lut_size_out_of_range_is_rejected() {
    let err = ScriptConfig::from_json_str(
        r#"{ "name": "x", "steps": [{ "kind": "lut3d", "size": 1 }] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ChainError::Configuration(_)), "{err}");
}

#[test]
fn zero_resize_is_rejected() {
    assert!(
        ScriptConfig::from_json_str(
            r#"{ "name": "x", "steps": [{ "kind": "resize", "width": 0, "height": 4 }] }"#,
        )
        .is_err()
    );
}

#[test]
fn preset_cycles_are_rejected() {
    let err = ScriptConfig::from_json_str(
        r#"{ "name": "x", "presets": {
            "a": [{ "kind": "preset", "name": "b" }],
            "b": [{ "kind": "preset", "name": "a" }]
        } }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("preset cycle"), "{err}");
}

#[test]
fn unknown_preset_is_rejected() {
    let err = ScriptConfig::from_json_str(
        r#"{ "name": "x", "steps": [{ "kind": "preset", "name": "missing" }] }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("missing"), "{err}");
}

#[test]
fn missing_file_names_the_path() {
    let err = ScriptConfig::from_path("/definitely/not/here.json").unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.json"), "{err}");
}

#[test]
fn serializes_back_to_equivalent_config() {
    let config = ScriptConfig::from_json_str(SAMPLE).unwrap();
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(ScriptConfig::from_json_str(&json).unwrap(), config);
}
