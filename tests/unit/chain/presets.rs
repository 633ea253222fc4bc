use super::*;
use crate::chain::step::{ConditionalStep, DoubleSizeStep, PresetStep};

fn preset(name: &str) -> ChainStep {
    ChainStep::Preset(PresetStep {
        name: name.to_owned(),
    })
}

#[test]
fn lookup_and_listing() {
    let mut reg = PresetRegistry::new();
    assert!(reg.is_empty());
    reg.insert("sharp", vec![ChainStep::DoubleSize(DoubleSizeStep::default())]);
    reg.insert("plain", vec![]);

    assert_eq!(reg.len(), 2);
    assert_eq!(reg.names().collect::<Vec<_>>(), vec!["plain", "sharp"]);
    assert_eq!(reg.get("sharp").unwrap().len(), 1);
    assert!(reg.get("blur").unwrap_err().to_string().contains("unknown preset 'blur'"));
}

#[test]
fn nested_references_resolve() {
    let mut reg = PresetRegistry::new();
    reg.insert("inner", vec![ChainStep::Identity]);
    reg.insert("outer", vec![preset("inner"), preset("inner")]);
    reg.validate().unwrap();
    reg.validate_steps(&[preset("outer")]).unwrap();
}

#[test]
fn cycle_through_a_conditional_is_reported_with_its_path() {
    let mut reg = PresetRegistry::new();
    reg.insert("a", vec![preset("b")]);
    reg.insert(
        "b",
        vec![ChainStep::Conditional(ConditionalStep {
            condition: "true".to_owned(),
            steps: vec![preset("a")],
        })],
    );
    let msg = reg.validate().unwrap_err().to_string();
    assert!(msg.contains("preset cycle: a > b > a"), "{msg}");
}

#[test]
fn self_reference_is_a_cycle() {
    let mut reg = PresetRegistry::new();
    reg.insert("loop", vec![preset("loop")]);
    assert!(reg.validate_steps(&[preset("loop")]).is_err());
}
