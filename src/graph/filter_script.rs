use std::collections::{HashMap, HashSet};

use crate::foundation::core::FitPolicy;
use crate::foundation::error::{NewsreelError, NewsreelResult};
use crate::graph::ir::{MixDuration, Node, Operation, StreamKind, StreamRef, is_valid_label};

/// Rendered `-filter_complex` text for one encoder invocation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct FilterScript(String);

impl FilterScript {
    /// Lower filter nodes into script text: one chain per node, joined with `;`.
    pub fn render(nodes: &[Node]) -> NewsreelResult<Self> {
        let mut chains = Vec::with_capacity(nodes.len());
        for node in nodes {
            if !node.op.is_filter() {
                return Err(NewsreelError::graph(format!(
                    "{} node {} cannot appear in a filter script",
                    node.op.name(),
                    node.output
                )));
            }
            let pads: String = node.inputs.iter().map(StreamRef::pad).collect();
            chains.push(format!(
                "{pads}{}[{}]",
                filter_body(&node.op),
                node.output.as_str()
            ));
        }
        Ok(Self(chains.join(";")))
    }

    /// Script text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the script has no chains.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Re-parse the rendered text and check it is well formed against `input_count` registered
    /// inputs and the `maps` that will be passed alongside it.
    pub fn verify(&self, input_count: usize, maps: &[StreamRef]) -> NewsreelResult<()> {
        let mut produced = HashSet::<&str>::new();
        let mut consumed = HashMap::<&str, usize>::new();

        if !self.0.is_empty() {
            for chain in self.0.split(';') {
                let parsed = parse_chain(chain)?;
                for pad in parsed.inputs {
                    match parse_input_pad(pad) {
                        Some((index, _)) if index >= input_count => {
                            return Err(NewsreelError::graph(format!(
                                "pad [{pad}] references input {index} but only {input_count} are registered"
                            )));
                        }
                        Some(_) => {}
                        None => {
                            if !produced.contains(pad) {
                                return Err(NewsreelError::graph(format!(
                                    "pad [{pad}] consumed before it is produced"
                                )));
                            }
                            *consumed.entry(pad).or_default() += 1;
                        }
                    }
                }
                if !produced.insert(parsed.output) {
                    return Err(NewsreelError::graph(format!(
                        "label [{}] produced twice",
                        parsed.output
                    )));
                }
            }
        }

        for m in maps {
            match m {
                StreamRef::Input { index, .. } => {
                    if index.as_usize() >= input_count {
                        return Err(NewsreelError::graph(format!(
                            "map {} references input {index} but only {input_count} are registered",
                            m.map_arg()
                        )));
                    }
                }
                StreamRef::Label { label } => {
                    let Some(known) = produced.get(label.as_str()) else {
                        return Err(NewsreelError::graph(format!(
                            "map {label} references a label the script never produces"
                        )));
                    };
                    *consumed.entry(*known).or_default() += 1;
                }
            }
        }

        for label in &produced {
            let uses = consumed.get(label).copied().unwrap_or(0);
            if uses != 1 {
                return Err(NewsreelError::graph(format!(
                    "label [{label}] consumed {uses} times, expected exactly once"
                )));
            }
        }
        Ok(())
    }

    /// [`FilterScript::verify`] plus a cross-check that the parsed pads are exactly the ones the
    /// nodes declare.
    pub fn verify_against(
        &self,
        nodes: &[Node],
        input_count: usize,
        maps: &[StreamRef],
    ) -> NewsreelResult<()> {
        self.verify(input_count, maps)?;

        let mut declared_out: Vec<&str> = nodes.iter().map(|n| n.output.as_str()).collect();
        let mut declared_in: Vec<String> = nodes
            .iter()
            .flat_map(|n| n.inputs.iter().map(StreamRef::pad))
            .collect();
        let mut parsed_out = Vec::new();
        let mut parsed_in = Vec::new();
        if !self.0.is_empty() {
            for chain in self.0.split(';') {
                let parsed = parse_chain(chain)?;
                parsed_out.push(parsed.output);
                parsed_in.extend(parsed.inputs.iter().map(|p| format!("[{p}]")));
            }
        }
        declared_out.sort_unstable();
        parsed_out.sort_unstable();
        declared_in.sort_unstable();
        parsed_in.sort_unstable();
        if declared_out != parsed_out || declared_in != parsed_in {
            return Err(NewsreelError::graph(
                "rendered filter script does not match its nodes",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for FilterScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn filter_body(op: &Operation) -> String {
    match op {
        Operation::NormalizeVideo {
            format,
            fit,
            fill,
            duration_sec,
        } => {
            let (w, h) = (format.canvas.width, format.canvas.height);
            let fitted = match fit {
                FitPolicy::Contain => format!(
                    "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color={}",
                    fill.as_ffmpeg()
                ),
                FitPolicy::Cover => {
                    format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}")
                }
            };
            format!(
                "{fitted},setsar=1,fps={},format={},trim=duration={duration_sec},setpts=PTS-STARTPTS",
                format.fps,
                format.pixel_format.as_ffmpeg()
            )
        }
        Operation::ConcatVideo { segments } => format!("concat=n={segments}:v=1:a=0"),
        Operation::ScaleOverlaySource { width } => format!("scale={width}:-1"),
        Operation::Overlay { x, y } => format!("overlay={x}:{y}"),
        Operation::Attenuate { gain } => format!("volume={gain}"),
        Operation::MixAudio { inputs, duration } => {
            let duration = match duration {
                MixDuration::First => "first",
            };
            format!("amix=inputs={inputs}:duration={duration}:dropout_transition=0:normalize=0")
        }
        Operation::Mux => String::new(),
    }
}

struct ParsedChain<'a> {
    inputs: Vec<&'a str>,
    output: &'a str,
}

fn parse_chain(chain: &str) -> NewsreelResult<ParsedChain<'_>> {
    let mut rest = chain.trim();
    if rest.is_empty() {
        return Err(NewsreelError::graph("empty filter chain (stray ';')"));
    }

    let mut inputs = Vec::new();
    while let Some(after) = rest.strip_prefix('[') {
        let end = after
            .find(']')
            .ok_or_else(|| NewsreelError::graph(format!("unbalanced '[' in chain '{chain}'")))?;
        inputs.push(&after[..end]);
        rest = &after[end + 1..];
    }

    let mut outputs = Vec::new();
    while let Some(before) = rest.strip_suffix(']') {
        let start = before
            .rfind('[')
            .ok_or_else(|| NewsreelError::graph(format!("unbalanced ']' in chain '{chain}'")))?;
        outputs.push(&before[start + 1..]);
        rest = &before[..start];
    }

    if rest.trim().is_empty() {
        return Err(NewsreelError::graph(format!(
            "chain '{chain}' has no filter body"
        )));
    }
    if rest.contains(['[', ']', ';']) {
        return Err(NewsreelError::graph(format!(
            "stray bracket or separator in filter body '{rest}'"
        )));
    }
    if inputs.is_empty() {
        return Err(NewsreelError::graph(format!(
            "chain '{chain}' has no input pads"
        )));
    }
    let [output] = outputs.as_slice() else {
        return Err(NewsreelError::graph(format!(
            "chain '{chain}' must produce exactly one labelled output"
        )));
    };
    for pad in inputs.iter().chain([output]) {
        if parse_input_pad(pad).is_none() && !is_valid_label(pad) {
            return Err(NewsreelError::graph(format!("malformed pad [{pad}]")));
        }
    }
    if parse_input_pad(output).is_some() {
        return Err(NewsreelError::graph(format!(
            "chain output [{output}] shadows an input stream"
        )));
    }

    Ok(ParsedChain {
        output: *output,
        inputs,
    })
}

fn parse_input_pad(pad: &str) -> Option<(usize, StreamKind)> {
    let (index, spec) = pad.split_once(':')?;
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let kind = match spec {
        "v" => StreamKind::Video,
        "a" => StreamKind::Audio,
        _ => return None,
    };
    Some((index.parse().ok()?, kind))
}

#[cfg(test)]
#[path = "../../tests/unit/graph/filter_script.rs"]
mod tests;
