use wikifmt_babel::{FormatError, SurfaceRegistry};

#[test]
fn test_default_surfaces() {
    let surfaces = SurfaceRegistry::default();
    assert_eq!(
        surfaces.list_surfaces(),
        vec!["plain-text", "preview", "rich-text", "source"]
    );
    assert!(!surfaces.get("preview").unwrap().is_editable());
    assert!(surfaces.get("rich-text").unwrap().is_live());
    assert!(!surfaces.get("plain-text").unwrap().is_live());
}

#[test]
fn test_unknown_surface() {
    let surfaces = SurfaceRegistry::default();
    assert_eq!(
        surfaces.get("wysiwyg").err(),
        Some(FormatError::SurfaceNotFound("wysiwyg".to_string()))
    );
}
