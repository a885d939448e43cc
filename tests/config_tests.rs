use std::io::Write;

use memory_frame::config::{Configuration, ExportFormat, PAPER, StrategyKind};
use memory_frame::processing::layout::Size;
use memory_frame::tasks::capture::CaptureStrategy;

#[test]
fn empty_document_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.frame.size, Size::new(600.0, 800.0));
    assert_eq!(cfg.frame.paper_color, PAPER);
    assert_eq!(cfg.frame.footer_lines.len(), 3);
    assert!(cfg.overlays.film_grain && cfg.overlays.warm_tone && !cfg.overlays.light_leak);
    assert!((cfg.transform.min_scale - 0.5).abs() < f32::EPSILON);
    assert!((cfg.transform.max_scale - 3.0).abs() < f32::EPSILON);
    assert_eq!(
        cfg.export.capture_strategy(),
        CaptureStrategy::LiveScene { pixel_density: 2.0 }
    );
}

#[test]
fn parse_kebab_case_sections() {
    let yaml = r##"
frame:
  size: [480, 720]
  paper-color: "#FFFFFF"
  colors:
    title: "#000000"
transform:
  max-scale: 4.0
  fit-width-ratio: 0.9
overlays:
  light-leak: true
export:
  strategy: fixed-canvas
  canvas: [1200, 1800]
  format: jpeg
  jpeg-quality: 85
share:
  base-url: "https://photos.example"
"##;
    let cfg = Configuration::from_yaml_str(yaml).unwrap().validated().unwrap();
    assert_eq!(cfg.frame.size, Size::new(480.0, 720.0));
    assert_eq!(cfg.frame.paper_color.rgb_channels(), [255, 255, 255]);
    assert_eq!(cfg.frame.colors.title.rgb_channels(), [0, 0, 0]);
    assert!((cfg.transform.max_scale - 4.0).abs() < f32::EPSILON);
    assert!((cfg.transform.min_scale - 0.5).abs() < f32::EPSILON);
    assert!(cfg.overlays.light_leak);
    assert_eq!(cfg.export.strategy, StrategyKind::FixedCanvas);
    assert_eq!(cfg.export.format, ExportFormat::Jpeg);
    assert_eq!(
        cfg.export.capture_strategy(),
        CaptureStrategy::FixedCanvas {
            width: 1200,
            height: 1800
        }
    );
    assert_eq!(cfg.share.base_url.as_deref(), Some("https://photos.example"));
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
export:
  pixel-densty: 3.0
"#;
    assert!(Configuration::from_yaml_str(yaml).is_err());
}

#[test]
fn bad_colors_are_rejected() {
    let yaml = r#"
frame:
  paper-color: "beige"
"#;
    assert!(Configuration::from_yaml_str(yaml).is_err());
}

#[test]
fn validation_catches_out_of_range_values() {
    let cases = [
        "transform:\n  min-scale: 0.0\n",
        "transform:\n  min-scale: 1.5\n",
        "transform:\n  fit-height-ratio: 1.2\n",
        "export:\n  pixel-density: 0.0\n",
        "export:\n  jpeg-quality: 0\n",
        "export:\n  canvas: [0, 100]\n",
        "frame:\n  size: [0, 800]\n",
        "frame:\n  paper-color: \"#F5F1E880\"\n",
    ];
    for yaml in cases {
        let cfg = Configuration::from_yaml_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "accepted {yaml:?}");
    }
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "frame:\n  title: \"Reunion\"").unwrap();
    let cfg = Configuration::from_yaml_file(file.path()).unwrap();
    assert_eq!(cfg.frame.title, "Reunion");

    let missing = file.path().with_extension("missing");
    assert!(Configuration::from_yaml_file(&missing).is_err());
}

#[test]
fn fixed_canvas_too_short_for_frame_is_rejected() {
    let yaml = r#"
export:
  strategy: fixed-canvas
  canvas: [1080, 400]
"#;
    let err = Configuration::from_yaml_str(yaml)
        .unwrap()
        .validated()
        .unwrap_err();
    assert!(err.to_string().contains("too short"), "{err:#}");

    // the same canvas is fine when exporting the live scene
    let yaml = r#"
export:
  canvas: [1080, 400]
"#;
    assert!(Configuration::from_yaml_str(yaml).unwrap().validated().is_ok());
}
