use super::*;

fn voice() -> AssetRef {
    AssetRef::new("UklGRg==", Some("audio/wav"))
}

fn clip(d: f64) -> Clip {
    Clip::new(AssetRef::new("iVBORw0KGgo=", Some("image/png")), d)
}

#[test]
fn camel_case_request_parses() {
    let req = RenderRequest::from_json_str(
        r#"{
            "voiceTrack": { "data": "UklGRg==", "contentType": "audio/wav" },
            "logoOverlay": "data:image/png;base64,iVBORw0KGgo=",
            "clips": [
                { "image": { "data": "iVBORw0KGgo=" }, "durationSeconds": 2.5 },
                { "image": "iVBORw0KGgo=" }
            ]
        }"#,
    )
    .unwrap();
    req.validate().unwrap();
    assert_eq!(req.clips.len(), 2);
    assert_eq!(req.clips[0].duration_seconds, 2.5);
    assert_eq!(req.clips[1].duration_seconds, DEFAULT_CLIP_DURATION_SECS);
    let logo = req.logo_overlay.as_ref().unwrap();
    assert_eq!(logo.content_type.as_deref(), Some("image/png"));
    assert_eq!(logo.data, "iVBORw0KGgo=");
    assert!(req.background_music.is_none());
    assert_eq!(req.total_clip_secs(), 7.5);
}

#[test]
fn legacy_field_names_are_accepted() {
    let req = RenderRequest::from_json_str(
        r#"{
            "audioData": "data:audio/mpeg;base64,SUQz",
            "bgmData": { "data": "SUQz", "mimeType": "audio/mpeg" },
            "clips": [{ "imageData": "iVBORw0KGgo=", "duration": 3 }]
        }"#,
    )
    .unwrap();
    assert_eq!(
        req.voice_track.as_ref().unwrap().content_type.as_deref(),
        Some("audio/mpeg")
    );
    assert_eq!(
        req.background_music.as_ref().unwrap().content_type.as_deref(),
        Some("audio/mpeg")
    );
    assert_eq!(req.clips[0].duration_seconds, 3.0);
}

#[test]
fn missing_voice_is_invalid() {
    let req = RenderRequest::default().with_clip(clip(1.0));
    assert!(matches!(req.validate(), Err(NewsreelError::InvalidRequest(_))));

    let blank = RenderRequest::new(AssetRef::new("  ", None)).with_clip(clip(1.0));
    assert!(matches!(blank.validate(), Err(NewsreelError::InvalidRequest(_))));
}

#[test]
fn empty_clip_list_is_invalid() {
    let req = RenderRequest::new(voice());
    assert!(matches!(req.validate(), Err(NewsreelError::InvalidRequest(_))));
}

#[test]
fn non_positive_durations_are_invalid() {
    for d in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let req = RenderRequest::new(voice()).with_clip(clip(d));
        assert!(
            matches!(req.validate(), Err(NewsreelError::InvalidRequest(_))),
            "duration {d} accepted"
        );
    }
}

#[test]
fn malformed_json_is_invalid_request() {
    assert!(matches!(
        RenderRequest::from_json_str("{ not json"),
        Err(NewsreelError::InvalidRequest(_))
    ));
}
