use image::{Rgba, Rgba32FImage};

use super::*;
use crate::device::shaders::DoubleSize;
use crate::foundation::core::TextureSize;

fn desc(w: u32, h: u32) -> TextureDesc {
    TextureDesc::new(TextureSize::new(w, h).unwrap(), TextureFormat::Rgba32F)
}

fn gradient(w: u32, h: u32) -> Rgba32FImage {
    Rgba32FImage::from_fn(w, h, |x, y| Rgba([x as f32, y as f32, 0.0, 1.0]))
}

#[test]
fn create_and_release_track_live_counts() {
    let device = CpuDevice::default();
    let a = device.create_texture(desc(4, 4)).unwrap();
    let b = device.create_texture(desc(2, 2)).unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(device.stats().live_textures, 2);
    assert_eq!(device.stats().live_bytes, 16 * 16 + 4 * 16);

    device.release_texture(&a);
    assert!(!device.is_live(&a));
    assert_eq!(device.stats().live_textures, 1);
    assert_eq!(device.stats().textures_released, 1);

    // Releasing twice is ignored.
    device.release_texture(&a);
    assert_eq!(device.stats().textures_released, 1);
}

#[test]
fn limits_report_resource_exhaustion() {
    let device = CpuDevice::new(CpuDeviceOpts {
        max_textures: Some(1),
        max_bytes: None,
    });
    device.create_texture(desc(1, 1)).unwrap();
    let err = device.create_texture(desc(1, 1)).unwrap_err();
    assert!(err.is_resource_exhaustion());

    let device = CpuDevice::new(CpuDeviceOpts {
        max_textures: None,
        max_bytes: Some(100),
    });
    let err = device.create_texture(desc(4, 4)).unwrap_err();
    assert!(err.is_resource_exhaustion());
}

#[test]
fn dispatch_runs_shader_into_output() {
    let device = CpuDevice::default();
    let src = device
        .create_from_image(gradient(2, 2), TextureFormat::Rgba32F)
        .unwrap();
    let dst = device.create_texture(desc(4, 4)).unwrap();
    device.dispatch(&DoubleSize, &[&src], &dst).unwrap();

    let out = device.download(&dst).unwrap();
    assert_eq!(out.get_pixel(3, 2).0, [1.0, 1.0, 0.0, 1.0]);
    assert_eq!(device.stats().dispatches, 1);
}

#[test]
fn dispatch_rejects_aliased_output() {
    let device = CpuDevice::default();
    let t = device.create_texture(desc(2, 2)).unwrap();
    let err = device.dispatch(&DoubleSize, &[&t], &t).unwrap_err();
    assert!(err.is_contract_violation());
    // The texture survives the failed pass.
    assert!(device.is_live(&t));
}

#[test]
fn dispatch_with_released_input_fails_and_keeps_output() {
    let device = CpuDevice::default();
    let src = device.create_texture(desc(2, 2)).unwrap();
    let dst = device.create_texture(desc(4, 4)).unwrap();
    device.release_texture(&src);
    assert!(device.dispatch(&DoubleSize, &[&src], &dst).is_err());
    assert!(device.is_live(&dst));
}

#[test]
fn scale_picks_filter_by_direction() {
    let device = CpuDevice::default();
    let src = device
        .create_from_image(gradient(2, 1), TextureFormat::Rgba32F)
        .unwrap();
    let up = device.create_texture(desc(4, 1)).unwrap();

    device
        .scale(&up, &src, ScalerKind::Nearest, ScalerKind::Bilinear)
        .unwrap();
    let px: Vec<f32> = device
        .download(&up)
        .unwrap()
        .pixels()
        .map(|p| p.0[0])
        .collect();
    assert_eq!(px, vec![0.0, 0.0, 1.0, 1.0]);

    device
        .scale(&up, &src, ScalerKind::Bilinear, ScalerKind::Nearest)
        .unwrap();
    let px: Vec<f32> = device
        .download(&up)
        .unwrap()
        .pixels()
        .map(|p| p.0[0])
        .collect();
    assert_eq!(px, vec![0.0, 0.25, 0.75, 1.0]);
    assert_eq!(device.stats().scale_calls, 2);
}

#[test]
fn upload_rejects_wrong_dimensions() {
    let device = CpuDevice::default();
    let t = device.create_texture(desc(2, 2)).unwrap();
    assert!(device.upload(&t, gradient(3, 3)).is_err());
}
