use image::{Rgba, Rgba32FImage};

use super::*;

fn rgba(w: u32, h: u32) -> TextureDesc {
    TextureDesc::new(TextureSize::new(w, h).unwrap(), TextureFormat::Rgba32F)
}

#[test]
fn double_size_declares_twice_the_input() {
    let out = DoubleSize.output_desc(&[rgba(3, 5)]).unwrap();
    assert_eq!(out, rgba(6, 10));
    assert!(DoubleSize.output_desc(&[]).is_err());
}

#[test]
fn yuv_to_rgb_neutral_chroma_is_grey() {
    let luma = Rgba32FImage::from_pixel(1, 1, Rgba([0.25, 0.0, 0.0, 0.0]));
    let chroma = Rgba32FImage::from_pixel(1, 1, Rgba([0.5, 0.5, 0.0, 0.0]));
    let mut out = Rgba32FImage::new(1, 1);
    YuvToRgb.execute_cpu(&[&luma, &chroma], &mut out).unwrap();
    assert_eq!(out.get_pixel(0, 0).0, [0.25, 0.25, 0.25, 1.0]);
}

#[test]
fn yuv_to_rgb_requires_matching_planes() {
    let luma = TextureDesc::new(TextureSize::new(4, 4).unwrap(), TextureFormat::R32F);
    let chroma = TextureDesc::new(TextureSize::new(2, 2).unwrap(), TextureFormat::Rg32F);
    assert!(YuvToRgb.output_desc(&[luma, chroma]).is_err());
}

fn apply_lut(mode: LutMode, colour: [f32; 4]) -> [f32; 4] {
    let table = LutTable::new(5, mode).unwrap();
    let d = table.desc().unwrap();
    let mut lut = Rgba32FImage::new(d.size.width, d.size.height);
    table.execute_cpu(&[], &mut lut).unwrap();

    let src = Rgba32FImage::from_pixel(1, 1, Rgba(colour));
    let mut out = Rgba32FImage::new(1, 1);
    Lut3d.execute_cpu(&[&src, &lut], &mut out).unwrap();
    out.get_pixel(0, 0).0
}

#[test]
fn identity_lut_preserves_grid_colours() {
    assert_eq!(
        apply_lut(LutMode::Identity, [0.25, 0.5, 1.0, 0.5]),
        [0.25, 0.5, 1.0, 0.5]
    );
}

#[test]
fn channel_swap_lut_rotates_channels() {
    assert_eq!(
        apply_lut(LutMode::ChannelSwap, [0.25, 0.5, 1.0, 1.0]),
        [1.0, 0.25, 0.5, 1.0]
    );
}

#[test]
fn lut_table_rejects_degenerate_sizes() {
    assert!(LutTable::new(1, LutMode::Identity).is_err());
    assert!(LutTable::new(65, LutMode::Identity).is_err());
}

#[test]
fn error_card_fills_target() {
    let size = TextureSize::new(8, 8).unwrap();
    let card = ErrorCard::new(size, "boom").unwrap();
    assert_eq!(card.output_desc(&[]).unwrap().size, size);
    let mut out = Rgba32FImage::new(8, 8);
    card.execute_cpu(&[], &mut out).unwrap();
    assert_eq!(out.get_pixel(0, 0).0, ErrorCard::STRIPE);
    assert_eq!(out.get_pixel(2, 0).0, ErrorCard::BACKGROUND);
}

fn draw_card(message: &str) -> Rgba32FImage {
    let card = ErrorCard::new(TextureSize::new(96, 48).unwrap(), message).unwrap();
    let mut out = Rgba32FImage::new(96, 48);
    card.execute_cpu(&[], &mut out).unwrap();
    out
}

#[test]
fn error_card_draws_its_message() {
    let blank = draw_card("");
    let short = draw_card("short");
    let long = draw_card("a completely different, much longer error message\nwith a trace");
    assert_ne!(short, blank);
    assert_ne!(short, long);
    // The border row keeps the bare stripes.
    for x in 0..96 {
        assert_eq!(long.get_pixel(x, 0), blank.get_pixel(x, 0));
    }
}

#[test]
fn error_card_accepts_markup_characters() {
    let plain = draw_card("a < b && c > \"d\"\u{7}");
    assert_ne!(plain, draw_card(""));
}
