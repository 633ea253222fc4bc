use super::*;

#[test]
fn size_new_rejects_empty() {
    assert!(TextureSize::new(0, 4).is_err());
    assert!(TextureSize::new(4, 0).is_err());
    assert_eq!(TextureSize::new(4, 2).unwrap().area(), 8);
}

#[test]
fn size_parse_accepts_wxh() {
    let s = TextureSize::parse("1920x1080").unwrap();
    assert_eq!(s, TextureSize::new(1920, 1080).unwrap());
    assert_eq!(s.to_string(), "1920x1080");
    assert!(TextureSize::parse("1920").is_err());
    assert!(TextureSize::parse("ax2").is_err());
}

#[test]
fn smaller_than_checks_either_axis() {
    let a = TextureSize::new(4, 8).unwrap();
    let b = TextureSize::new(8, 4).unwrap();
    assert!(a.is_smaller_than(b));
    assert!(b.is_smaller_than(a));
    assert!(!a.is_smaller_than(a));
    assert_eq!(a.scaled(2), TextureSize::new(8, 16).unwrap());
}

#[test]
fn desc_byte_len_follows_format() {
    let size = TextureSize::new(2, 2).unwrap();
    assert_eq!(TextureDesc::new(size, TextureFormat::R32F).byte_len(), 16);
    assert_eq!(TextureDesc::new(size, TextureFormat::Rgba32F).byte_len(), 64);
    let d = TextureDesc::new(size, TextureFormat::Rg32F);
    assert_eq!(d.with_format(TextureFormat::Rgba16F).byte_len(), 32);
}
