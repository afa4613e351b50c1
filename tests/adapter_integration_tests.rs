//! Integration tests for the format adapters
//!
//! These tests go through `adapter_for` the way the engine does: bytes in,
//! values looked up and edited, bytes out.

use game_settings_engine::FormatError;
use game_settings_engine::adapters::{Locator, LookupError, adapter_for};
use game_settings_engine::models::{FieldName, FileView};

fn sectional(section: &str, key: &str) -> Locator {
    Locator::Sectional {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn tag(path: &[&str], tag: &str, attribute: &str) -> Locator {
    Locator::Tag {
        path: path.iter().map(|s| s.to_string()).collect(),
        tag: tag.to_string(),
        attribute: attribute.to_string(),
    }
}

const PREFS: &str = "; Настройки игры\r\n[Display]\r\nbFull Screen = 1\r\niSize W=1920\r\n\r\n[Audio]\r\nfVal0=0.8000\r\n";

#[test]
fn test_sectional_cp1251_round_trip_is_byte_identical() {
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(PREFS);
    let adapter = adapter_for(FileView::Sectional, "= ");

    let parsed = adapter.read(&bytes, "win1251").unwrap();
    let written = adapter.write(parsed.as_ref(), "win1251").unwrap();

    assert_eq!(written, bytes.into_owned());
}

#[test]
fn test_sectional_edit_changes_only_the_value() {
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(PREFS);
    let adapter = adapter_for(FileView::Sectional, "= ");

    let mut parsed = adapter.read(&bytes, "win1251").unwrap();
    assert_eq!(
        adapter.get(parsed.as_ref(), &sectional("Display", "bFull Screen")).unwrap(),
        "1"
    );

    adapter
        .set(parsed.as_mut(), &sectional("Display", "bFull Screen"), "0")
        .unwrap();
    let written = adapter.write(parsed.as_ref(), "win1251").unwrap();

    let expected = PREFS.replace("bFull Screen = 1", "bFull Screen = 0");
    let (expected, _, _) = encoding_rs::WINDOWS_1251.encode(&expected);
    assert_eq!(written, expected.into_owned());
}

#[test]
fn test_sectional_lookup_errors_point_at_fields() {
    let adapter = adapter_for(FileView::Sectional, "= ");
    let parsed = adapter.parse(PREFS).unwrap();

    let err = adapter
        .get(parsed.as_ref(), &sectional("Graphics", "bFull Screen"))
        .unwrap_err();
    assert!(matches!(err, LookupError::SectionMissing { .. }));
    assert_eq!(err.field(), FieldName::IniGroup);

    let err = adapter
        .get(parsed.as_ref(), &sectional("Display", "bBorderless"))
        .unwrap_err();
    assert!(matches!(err, LookupError::KeyMissing { .. }));
    assert_eq!(err.field(), FieldName::Name);
}

#[test]
fn test_line_adapter_with_space_delimiter() {
    let text = "// comment\nr_fullscreen 1\nr_mode=3\n";
    let adapter = adapter_for(FileView::Line, " =");

    let mut parsed = adapter.parse(text).unwrap();
    let locator = Locator::Line {
        name: "r_fullscreen".to_string(),
    };
    assert_eq!(adapter.get(parsed.as_ref(), &locator).unwrap(), "1");
    assert_eq!(
        adapter
            .get(
                parsed.as_ref(),
                &Locator::Line {
                    name: "r_mode".to_string()
                }
            )
            .unwrap(),
        "3"
    );

    adapter.set(parsed.as_mut(), &locator, "0").unwrap();
    assert_eq!(
        adapter.serialize(parsed.as_ref()),
        "// comment\nr_fullscreen 0\nr_mode=3\n"
    );
}

#[test]
fn test_tag_lookup_distinguishes_missing_parts() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<Settings>
  <Graphics>
    <Resolution width="1920" height="1080"/>
  </Graphics>
</Settings>"#;
    let adapter = adapter_for(FileView::Tag, "= ");
    let parsed = adapter.read(xml.as_bytes(), "utf-8").unwrap();

    assert_eq!(
        adapter
            .get(parsed.as_ref(), &tag(&["Settings", "Graphics"], "Resolution", "width"))
            .unwrap(),
        "1920"
    );

    let err = adapter
        .get(parsed.as_ref(), &tag(&["Settings", "Audio"], "Resolution", "width"))
        .unwrap_err();
    assert_eq!(err.field(), FieldName::ValuePath);

    let err = adapter
        .get(parsed.as_ref(), &tag(&["Settings", "Graphics"], "Quality", "level"))
        .unwrap_err();
    assert_eq!(err.field(), FieldName::Name);

    let err = adapter
        .get(parsed.as_ref(), &tag(&["Settings", "Graphics"], "Resolution", "depth"))
        .unwrap_err();
    assert_eq!(err.field(), FieldName::ValueName);
}

#[test]
fn test_tag_edit_keeps_declaration() {
    let xml = "<?xml version=\"1.0\"?>\n<Settings>\n  <Sound volume=\"5\"/>\n</Settings>";
    let adapter = adapter_for(FileView::Tag, "= ");
    let mut parsed = adapter.parse(xml).unwrap();

    adapter
        .set(parsed.as_mut(), &tag(&["Settings"], "Sound", "volume"), "7")
        .unwrap();
    let text = adapter.serialize(parsed.as_ref());

    assert!(text.starts_with("<?xml version=\"1.0\"?>"));
    assert!(text.contains("volume=\"7\""));
    assert!(!text.contains("volume=\"5\""));
}

#[test]
fn test_unencodable_value_is_reported() {
    let adapter = adapter_for(FileView::Sectional, "= ");
    let mut parsed = adapter.parse("[General]\nsName=x\n").unwrap();
    adapter
        .set(parsed.as_mut(), &sectional("General", "sName"), "日本")
        .unwrap();

    let err = adapter.write(parsed.as_ref(), "win1251").unwrap_err();
    assert!(matches!(err, FormatError::Unencodable { .. }));
}

#[test]
fn test_utf16_is_not_supported() {
    let adapter = adapter_for(FileView::Sectional, "= ");
    let err = adapter.read(b"[General]\n", "utf-16").unwrap_err();
    assert!(matches!(err, FormatError::UnknownEncoding(_)));
}

#[test]
fn test_view_mismatch_is_a_file_error() {
    let adapter = adapter_for(FileView::Line, "= ");
    let parsed = adapter.parse("a=1\n").unwrap();

    let err = adapter
        .get(parsed.as_ref(), &sectional("General", "a"))
        .unwrap_err();
    assert_eq!(err.field(), FieldName::File);
}
