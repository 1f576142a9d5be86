use super::*;

#[test]
fn canvas_rejects_odd_or_empty_sizes() {
    assert!(Canvas::new(1280, 720).is_ok());
    assert!(Canvas::new(0, 720).is_err());
    assert!(Canvas::new(1281, 720).is_err());
    assert!(Canvas::new(1280, 719).is_err());
}

#[test]
fn fit_policy_parses_case_insensitively() {
    assert_eq!("Cover".parse::<FitPolicy>().unwrap(), FitPolicy::Cover);
    assert_eq!(" contain ".parse::<FitPolicy>().unwrap(), FitPolicy::Contain);
    assert!("stretch".parse::<FitPolicy>().is_err());
}

#[test]
fn rgb8_round_trips_hex_and_renders_for_encoder() {
    let c: Rgb8 = serde_json::from_str("\"#1a2B3c\"").unwrap();
    assert_eq!(
        c,
        Rgb8 {
            r: 0x1a,
            g: 0x2b,
            b: 0x3c
        }
    );
    assert_eq!(c.as_ffmpeg(), "0x1A2B3C");
    assert_eq!(serde_json::to_string(&c).unwrap(), "\"#1a2b3c\"");
    assert!(serde_json::from_str::<Rgb8>("\"#12345\"").is_err());
    assert!(serde_json::from_str::<Rgb8>("\"#zzzzzz\"").is_err());
}

#[test]
fn pixel_format_name() {
    assert_eq!(PixelFormat::Yuv420p.as_ffmpeg(), "yuv420p");
}
