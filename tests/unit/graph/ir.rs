use super::*;
use crate::test_support::graph;

fn expect_graph_error(g: &CompositionGraph, needle: &str) {
    match g.validate() {
        Err(NewsreelError::GraphConstruction(msg)) => {
            assert!(msg.contains(needle), "'{msg}' does not mention '{needle}'")
        }
        other => panic!("expected graph construction error, got {other:?}"),
    }
}

#[test]
fn labels_are_restricted() {
    assert!(StreamLabel::new("v0").is_ok());
    assert!(StreamLabel::new("base_1").is_ok());
    for bad in ["", "a b", "x]", "[y", "a;b", "0:v"] {
        assert!(StreamLabel::new(bad).is_err(), "{bad:?} accepted");
    }
}

#[test]
fn stream_refs_render_pads_and_maps() {
    let input = StreamRef::input(InputIndex(3), StreamKind::Video);
    assert_eq!(input.pad(), "[3:v]");
    assert_eq!(input.map_arg(), "3:v");
    let label = StreamRef::label(&StreamLabel::new("aout").unwrap());
    assert_eq!(label.pad(), "[aout]");
    assert_eq!(label.map_arg(), "[aout]");
}

#[test]
fn duplicate_input_index_is_detected() {
    let mut g = graph(&[1.0, 1.0, 1.0], false, false);
    g.inputs[2].index = InputIndex(1);
    expect_graph_error(&g, "assigned to both");
}

#[test]
fn index_gap_is_detected() {
    let mut g = graph(&[1.0, 1.0], false, false);
    g.inputs[2].index = InputIndex(5);
    expect_graph_error(&g, "contiguous");
}

#[test]
fn voice_must_be_input_zero() {
    let mut g = graph(&[1.0], false, false);
    g.inputs.swap(0, 1);
    g.inputs[0].index = InputIndex(0);
    g.inputs[1].index = InputIndex(1);
    assert!(g.validate().is_err());
}

#[test]
fn unregistered_input_reference_is_detected() {
    let mut g = graph(&[1.0, 1.0], false, false);
    g.nodes[0].inputs[0] = StreamRef::input(InputIndex(9), StreamKind::Video);
    expect_graph_error(&g, "unregistered input index 9");
}

#[test]
fn wrong_stream_kind_is_detected() {
    let mut g = graph(&[1.0], false, false);
    g.nodes[0].inputs[0] = StreamRef::input(InputIndex(0), StreamKind::Video);
    assert!(g.validate().is_err());
}

#[test]
fn dangling_and_reused_labels_are_detected() {
    let mut g = graph(&[1.0, 1.0], false, false);
    let concat = g.nodes.iter().position(|n| n.output.as_str() == "base").unwrap();
    g.nodes[concat].inputs[1] = g.nodes[concat].inputs[0].clone();
    expect_graph_error(&g, "consumed");

    let mut g = graph(&[1.0, 1.0], false, false);
    g.nodes[1].output = StreamLabel::new("v0").unwrap();
    expect_graph_error(&g, "produced more than once");
}

#[test]
fn node_order_must_follow_dependencies() {
    let mut g = graph(&[1.0, 1.0], false, false);
    g.nodes.swap(0, 2);
    for (i, n) in g.nodes.iter_mut().enumerate() {
        n.id = NodeId(i as u32);
    }
    expect_graph_error(&g, "before any node produces it");
}

#[test]
fn overlay_requires_registered_logo() {
    let mut g = graph(&[1.0], true, false);
    g.inputs.retain(|b| b.role != AssetRole::Logo);
    assert!(g.validate().is_err());
}

#[test]
fn mixing_without_music_is_rejected() {
    let mut with_music = graph(&[1.0], false, true);
    with_music.inputs.retain(|b| b.role != AssetRole::Music);
    assert!(with_music.validate().is_err());
}

#[test]
fn concat_inputs_must_share_the_canonical_format() {
    let mut g = graph(&[1.0, 1.0], false, false);
    if let Operation::NormalizeVideo { format, .. } = &mut g.nodes[1].op {
        format.fps = 25;
    }
    expect_graph_error(&g, "canonical");
}

#[test]
fn gain_outside_unit_interval_is_rejected() {
    let mut g = graph(&[1.0], false, true);
    for n in &mut g.nodes {
        if let Operation::Attenuate { gain } = &mut n.op {
            *gain = 1.5;
        }
    }
    expect_graph_error(&g, "gain");
}

#[test]
fn duration_and_fingerprint() {
    let g = graph(&[1.5, 2.0, 0.5], false, false);
    assert_eq!(g.video_duration_sec(), 4.0);
    assert_eq!(g.clip_count(), 3);
    assert_eq!(g.fingerprint().unwrap(), g.clone().fingerprint().unwrap());
    let other = graph(&[1.5, 2.0, 0.75], false, false);
    assert_ne!(g.fingerprint().unwrap(), other.fingerprint().unwrap());
}
