use super::*;
use crate::test_support::{graph, graph_with, request, resolved};

fn labels(g: &CompositionGraph) -> Vec<&str> {
    g.nodes.iter().map(|n| n.output.as_str()).collect()
}

#[test]
fn minimal_graph_passes_voice_straight_through() {
    let g = graph(&[2.0], false, false);
    assert_eq!(labels(&g), ["v0", "base", "out"]);
    let roles: Vec<AssetRole> = g.inputs.iter().map(|b| b.role).collect();
    assert_eq!(roles, [AssetRole::Voice, AssetRole::Clip(0)]);
    let mux = g.mux().unwrap();
    assert_eq!(mux.inputs[1], StreamRef::input(InputIndex(0), StreamKind::Audio));
    assert!(g.nodes.iter().all(|n| !matches!(
        n.op,
        Operation::Overlay { .. } | Operation::Attenuate { .. } | Operation::MixAudio { .. }
    )));
}

#[test]
fn inputs_are_registered_in_fixed_order() {
    let g = graph(&[1.0, 2.0, 3.0], true, true);
    let roles: Vec<AssetRole> = g.inputs.iter().map(|b| b.role).collect();
    assert_eq!(
        roles,
        [
            AssetRole::Voice,
            AssetRole::Clip(0),
            AssetRole::Clip(1),
            AssetRole::Clip(2),
            AssetRole::Logo,
            AssetRole::Music
        ]
    );
    for (pos, b) in g.inputs.iter().enumerate() {
        assert_eq!(b.index, InputIndex(pos as u32));
    }
    assert_eq!(
        labels(&g),
        ["v0", "v1", "v2", "base", "logo", "vlogo", "bgm", "aout", "out"]
    );
}

#[test]
fn clip_inputs_carry_their_durations() {
    let g = graph(&[1.25, 4.0], false, false);
    let stills: Vec<Option<f64>> = g.inputs.iter().map(|b| b.still_duration_sec).collect();
    assert_eq!(stills, [None, Some(1.25), Some(4.0)]);
    assert_eq!(g.video_duration_sec(), 5.25);
}

#[test]
fn music_is_attenuated_and_mixed_with_voice_first() {
    let cfg = RenderConfig {
        music_gain: 0.25,
        ..RenderConfig::default()
    };
    let g = graph_with(&cfg, &[1.0], false, true);
    let bgm = g.nodes.iter().find(|n| n.output.as_str() == "bgm").unwrap();
    assert_eq!(bgm.op, Operation::Attenuate { gain: 0.25 });
    assert_eq!(bgm.inputs, [StreamRef::input(InputIndex(2), StreamKind::Audio)]);
    let mix = g.nodes.iter().find(|n| n.output.as_str() == "aout").unwrap();
    assert_eq!(
        mix.op,
        Operation::MixAudio {
            inputs: 2,
            duration: MixDuration::First
        }
    );
    assert_eq!(mix.inputs[0], StreamRef::input(InputIndex(0), StreamKind::Audio));
}

#[test]
fn logo_is_scaled_and_overlaid_at_margin() {
    let g = graph(&[1.0, 1.0], true, false);
    let scale = g.nodes.iter().find(|n| n.output.as_str() == "logo").unwrap();
    assert_eq!(scale.op, Operation::ScaleOverlaySource { width: 150 });
    assert_eq!(scale.inputs, [StreamRef::input(InputIndex(3), StreamKind::Video)]);
    let overlay = g.nodes.iter().find(|n| n.output.as_str() == "vlogo").unwrap();
    assert_eq!(overlay.op, Operation::Overlay { x: 20, y: 20 });
    assert_eq!(g.mux().unwrap().inputs[0], StreamRef::label(&overlay.output));
}

#[test]
fn builds_are_deterministic() {
    let req = request(&[1.0, 2.0, 3.0], true, true);
    let assets = resolved(&req);
    let builder = GraphBuilder::new(&RenderConfig::default());
    let a = builder.build(&req, &assets).unwrap();
    let b = builder.build(&req, &assets).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
}

#[test]
fn empty_clip_list_is_invalid_request() {
    let req = request(&[1.0], false, false);
    let mut assets = resolved(&req);
    assets.clips.clear();
    let err = GraphBuilder::new(&RenderConfig::default())
        .build(&req, &assets)
        .unwrap_err();
    assert!(matches!(err, NewsreelError::InvalidRequest(_)));
}

#[test]
fn mismatched_assets_are_rejected() {
    let req = request(&[1.0, 1.0], false, false);
    let mut assets = resolved(&req);
    assets.clips.swap(0, 1);
    let err = GraphBuilder::new(&RenderConfig::default())
        .build(&req, &assets)
        .unwrap_err();
    assert!(matches!(err, NewsreelError::GraphConstruction(_)));

    let mut assets = resolved(&req);
    assets.clips.pop();
    assert!(GraphBuilder::new(&RenderConfig::default()).build(&req, &assets).is_err());
}

#[test]
fn registry_refuses_double_registration() {
    let mut registry = InputRegistry::default();
    registry.register(AssetRole::Voice, None).unwrap();
    assert_eq!(
        registry.register(AssetRole::Clip(0), Some(1.0)).unwrap(),
        InputIndex(1)
    );
    assert!(registry.register(AssetRole::Clip(0), Some(1.0)).is_err());
}
