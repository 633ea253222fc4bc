use image::{Rgba, Rgba32FImage};

use super::*;
use crate::chain::condition::ExprEvaluator;
use crate::chain::step::{ChainStep, ConditionalStep, DoubleSizeStep, Lut3dStep, ResizeStep};
use crate::device::RenderDevice;
use crate::device::cpu::CpuDevice;
use crate::device::shaders::{ErrorCard, LutMode};
use crate::filter::FilterKind;
use crate::foundation::core::{TextureDesc, TextureFormat, TextureSize};
use crate::pool::{PoolOpts, TexturePool};
use crate::renderer::FrameTargets;

fn rgba(w: u32, h: u32) -> TextureDesc {
    TextureDesc::new(TextureSize::new(w, h).unwrap(), TextureFormat::Rgba32F)
}

struct Harness {
    device: Rc<CpuDevice>,
    renderer: Rc<Renderer>,
    evaluator: Rc<ExprEvaluator>,
}

fn harness(input: (u32, u32), output: (u32, u32)) -> Harness {
    let device = Rc::new(CpuDevice::default());
    let pool = TexturePool::new(device.clone(), PoolOpts::default());
    let pixels = Rgba32FImage::from_fn(input.0, input.1, |x, y| {
        Rgba([x as f32 * 0.1, y as f32 * 0.1, 0.25, 1.0])
    });
    let input = device
        .create_from_image(pixels, TextureFormat::Rgba32F)
        .unwrap();
    let output = device.create_texture(rgba(output.0, output.1)).unwrap();
    let renderer = Renderer::new(device.clone(), pool, FrameTargets::rgb(input, output));
    Harness {
        device,
        renderer,
        evaluator: Rc::new(ExprEvaluator::new().with_flag("hdr", false)),
    }
}

fn script(h: &Harness, steps: Vec<ChainStep>) -> RenderScript {
    RenderScript::new(
        "test",
        Chain::new(steps),
        PresetRegistry::new(),
        h.evaluator.clone(),
        Rc::clone(&h.renderer),
    )
}

fn double() -> ChainStep {
    ChainStep::DoubleSize(DoubleSizeStep::default())
}

fn lut_if(condition: &str) -> ChainStep {
    ChainStep::Conditional(ConditionalStep {
        condition: condition.to_owned(),
        steps: vec![ChainStep::Lut3d(Lut3dStep {
            size: 4,
            mode: LutMode::ChannelSwap,
        })],
    })
}

#[test]
fn starts_uninitialized_and_cannot_execute() {
    let h = harness((4, 4), (8, 8));
    let mut s = script(&h, vec![double()]);
    assert_eq!(s.state(), ScriptState::Uninitialized);
    assert!(!s.execute());
    assert!(s.output_filter().is_none());
}

#[test]
fn update_reports_status_in_dependency_order() {
    let h = harness((4, 4), (8, 8));
    let mut s = script(&h, vec![double(), lut_if("hdr")]);
    s.update();

    assert_eq!(s.state(), ScriptState::Compiled);
    assert_eq!(
        s.status(),
        "Source > DoubleSize > Lut3D(4, channel_swap) > If(hdr) > SetSize(8x8)"
    );
    assert!(s.error_message().is_none());
    assert_eq!(
        s.output_filter().unwrap().description().unwrap(),
        rgba(8, 8)
    );
}

#[test]
fn execute_renders_straight_into_the_output_target() {
    let h = harness((4, 4), (8, 8));
    let mut s = script(&h, vec![double()]);
    s.update();

    assert!(s.execute());
    assert_eq!(s.state(), ScriptState::Idle);
    // The doubler wrote into the output target, so no final host scale was needed.
    assert_eq!(h.device.stats().scale_calls, 0);

    let target = h.renderer.targets().output;
    let out = h.device.download(&target).unwrap();
    let input = h.device.download(&h.renderer.targets().input).unwrap();
    assert_eq!(out.get_pixel(5, 3), input.get_pixel(2, 1));
    assert_eq!(h.renderer.pool().loaned_count(), 0);
}

#[test]
fn execute_scales_when_the_graph_ends_on_the_input() {
    let h = harness((8, 8), (8, 8));
    let mut s = script(&h, vec![]);
    s.update();
    assert_eq!(s.status(), "Source > SetSize(8x8)");

    assert!(s.execute());
    assert_eq!(h.device.stats().scale_calls, 1);
    let out = h.device.download(&h.renderer.targets().output).unwrap();
    let input = h.device.download(&h.renderer.targets().input).unwrap();
    assert_eq!(out, input);
}

#[test]
fn false_conditional_matches_the_unconditioned_chain() {
    let h = harness((4, 4), (8, 8));
    let mut plain = script(&h, vec![double()]);
    plain.update();
    assert!(plain.execute());
    let expected = h.device.download(&h.renderer.targets().output).unwrap();
    plain.dispose();

    let mut s = script(&h, vec![double(), lut_if("hdr")]);
    s.update();
    for _ in 0..3 {
        assert!(s.execute());
        let out = h.device.download(&h.renderer.targets().output).unwrap();
        assert_eq!(out, expected);
    }
}

#[test]
fn conditional_follows_the_flag_between_frames() {
    let h = harness((4, 4), (8, 8));
    let mut s = script(&h, vec![double(), lut_if("hdr")]);
    s.update();

    assert!(s.execute());
    let off = h.device.download(&h.renderer.targets().output).unwrap();
    h.evaluator.set_flag("hdr", true);
    assert!(s.execute());
    let on = h.device.download(&h.renderer.targets().output).unwrap();
    assert_ne!(off, on);
    assert_eq!(h.renderer.pool().loaned_count(), 0);
}

#[test]
fn compile_failure_installs_error_display() {
    let h = harness((4, 4), (8, 8));
    let mut s = script(
        &h,
        vec![ChainStep::Preset(crate::chain::step::PresetStep {
            name: "nope".to_owned(),
        })],
    );
    s.update();

    assert_eq!(s.status(), STATUS_INVALID);
    let message = s.error_message().unwrap();
    assert!(message.starts_with("Error in test:"), "{message}");
    assert!(message.contains("nope"), "{message}");
    assert!(message.contains("Stack Trace:"), "{message}");
    assert!(matches!(
        s.output_filter().unwrap().kind(),
        FilterKind::ErrorDisplay(_)
    ));

    // The warning card still reaches the screen.
    assert!(s.execute());
    let out = h.device.download(&h.renderer.targets().output).unwrap();
    assert_eq!(out.get_pixel(0, 0).0, ErrorCard::STRIPE);
    assert_eq!(out.get_pixel(1, 0).0, ErrorCard::BACKGROUND);
}

#[test]
fn render_failure_returns_false_and_leaks_nothing() {
    let h = harness((4, 4), (8, 8));
    let mut s = script(&h, vec![double(), lut_if("missing_flag")]);
    s.update();
    assert!(s.error_message().is_none());

    assert!(!s.execute());
    let message = s.error_message().unwrap();
    assert!(message.contains("missing_flag"), "{message}");
    assert!(message.contains("If(missing_flag)"), "{message}");
    assert_eq!(h.renderer.pool().loaned_count(), 0);

    // The next frame shows the error display instead.
    assert!(matches!(
        s.output_filter().unwrap().kind(),
        FilterKind::ErrorDisplay(_)
    ));
    assert!(s.execute());
}

#[test]
fn update_picks_up_new_targets() {
    let h = harness((4, 4), (8, 8));
    let mut s = script(&h, vec![double(), double()]);
    s.update();
    assert_eq!(s.status(), "Source > DoubleSize > SetSize(8x8)");

    let bigger = h.device.create_texture(rgba(16, 16)).unwrap();
    let mut targets = h.renderer.targets();
    targets.output = bigger;
    h.renderer.set_targets(targets);
    s.update();
    assert_eq!(s.status(), "Source > DoubleSize > DoubleSize > SetSize(16x16)");
    assert!(s.execute());
}

#[test]
fn resize_step_then_set_size_scales_through_pool() {
    let h = harness((4, 4), (8, 8));
    let mut s = script(
        &h,
        vec![ChainStep::Resize(ResizeStep {
            width: 6,
            height: 6,
        })],
    );
    s.update();
    assert_eq!(s.status(), "Source > Resize(6x6) > SetSize(8x8)");
    assert!(s.execute());
    assert_eq!(h.device.stats().scale_calls, 2);
}

#[test]
fn yuv_source_with_subsampled_chroma_starts_from_a_composition() {
    let device = Rc::new(CpuDevice::default());
    let pool = TexturePool::new(device.clone(), PoolOpts::default());
    let input = device.create_texture(rgba(8, 8)).unwrap();
    let output = device.create_texture(rgba(8, 8)).unwrap();
    let luma = device
        .create_texture(TextureDesc::new(
            TextureSize::new(8, 8).unwrap(),
            TextureFormat::R32F,
        ))
        .unwrap();
    let chroma = device
        .create_texture(TextureDesc::new(
            TextureSize::new(4, 4).unwrap(),
            TextureFormat::Rg32F,
        ))
        .unwrap();
    let renderer = Renderer::new(device, pool, FrameTargets::yuv(input, output, luma, chroma));
    let mut s = RenderScript::new(
        "yuv",
        Chain::new(vec![]),
        PresetRegistry::new(),
        Rc::new(ExprEvaluator::new()),
        renderer,
    );
    s.update();

    assert_eq!(s.status(), "Source > SetSize(8x8)");
    let out = s.output_filter().unwrap();
    assert!(out.inputs()[0].as_composition().is_some());
    assert!(s.execute());
}

#[test]
fn dispose_is_idempotent_and_final() {
    let h = harness((4, 4), (8, 8));
    let mut s = script(&h, vec![double(), lut_if("hdr")]);
    s.update();
    assert!(s.execute());

    s.dispose();
    s.dispose();
    assert_eq!(s.state(), ScriptState::Disposed);
    assert!(s.output_filter().is_none());
    assert!(!s.execute());
    s.update();
    assert_eq!(s.state(), ScriptState::Disposed);
}

#[test]
fn from_config_applies_scalers() {
    let h = harness((4, 4), (8, 8));
    let config = ScriptConfig::from_json_str(
        r#"{ "name": "cfg", "steps": [{ "kind": "double_size" }], "upscaler": "nearest" }"#,
    )
    .unwrap();
    let mut s = RenderScript::from_config(&config, h.evaluator.clone(), Rc::clone(&h.renderer))
        .unwrap();
    assert_eq!(s.name(), "cfg");
    assert_eq!(
        h.renderer.scalers().upscaler,
        crate::device::ScalerKind::Nearest
    );
    s.update();
    assert_eq!(s.status(), "Source > DoubleSize > SetSize(8x8)");
}
