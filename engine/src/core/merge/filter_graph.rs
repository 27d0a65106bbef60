//! Filter Graph Builder
//!
//! Builds the `-filter_complex` graph that normalizes every input to the
//! target frame size, square pixels, 30 fps and 44.1 kHz stereo audio, then
//! concatenates them in order. Inputs without an audio track get a trimmed
//! slice of a shared silent source so concat always sees matching pairs.
//!
//! The graph is kept as structured chains and rendered to text at the end,
//! so it can be inspected in tests without an engine.

use std::fmt;
use std::path::PathBuf;

use super::request::MediaDescriptor;
use crate::core::{Dimensions, TimeSec};

/// Output frame rate of every video branch
pub const OUTPUT_FPS: u32 = 30;
/// Silence length used when an input's duration is unknown
pub const DEFAULT_SILENCE_SECS: TimeSec = 10.0;
/// lavfi source spec for the shared silent input
pub const SILENT_SOURCE: &str = "anullsrc=channel_layout=stereo:sample_rate=44100";

/// Label of the concatenated video output
pub const OUTPUT_VIDEO_PAD: &str = "outv";
/// Label of the concatenated audio output
pub const OUTPUT_AUDIO_PAD: &str = "outa";

const AUDIO_FORMAT: &str = "sample_fmts=fltp:sample_rates=44100:channel_layouts=stereo";

/// A link label such as `[0:v]` or `[v0]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pad(String);

impl Pad {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Video stream of an engine input
    pub fn input_video(index: usize) -> Self {
        Self(format!("{}:v", index))
    }

    /// Audio stream of an engine input
    pub fn input_audio(index: usize) -> Self {
        Self(format!("{}:a", index))
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// One filter with its option string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub name: &'static str,
    pub options: String,
}

impl Filter {
    pub fn new(name: &'static str, options: impl Into<String>) -> Self {
        Self {
            name,
            options: options.into(),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.options.is_empty() {
            f.write_str(self.name)
        } else {
            write!(f, "{}={}", self.name, self.options)
        }
    }
}

/// Linear chain of filters between input and output pads
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterChain {
    pub inputs: Vec<Pad>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<Pad>,
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "{}", pad)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        for pad in &self.outputs {
            write!(f, "{}", pad)?;
        }
        Ok(())
    }
}

/// How one input's audio reaches concat
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioBranch {
    /// Reformat the input's own audio
    Source,
    /// Trim the shared silent source to this length
    Silence { duration_secs: TimeSec },
}

/// Complete merge graph for one job
#[derive(Clone, Debug, PartialEq)]
pub struct FilterGraph {
    target: Dimensions,
    audio: Vec<AudioBranch>,
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    /// Build the graph for `inputs` in concatenation order.
    pub fn build(inputs: &[MediaDescriptor], target: Dimensions) -> Self {
        let n = inputs.len();
        let silent_index = n;

        let audio: Vec<AudioBranch> = inputs
            .iter()
            .map(|input| {
                if input.has_audio {
                    AudioBranch::Source
                } else {
                    let duration_secs = if input.duration_secs > 0.0 {
                        input.duration_secs
                    } else {
                        DEFAULT_SILENCE_SECS
                    };
                    AudioBranch::Silence { duration_secs }
                }
            })
            .collect();

        let silent_consumers = audio
            .iter()
            .filter(|branch| matches!(branch, AudioBranch::Silence { .. }))
            .count();

        let mut chains = Vec::with_capacity(2 * n + 2);

        // anullsrc has a single output; fan it out when several inputs need it.
        let mut silence_pads: Vec<Pad> = if silent_consumers > 1 {
            let outputs: Vec<Pad> = (0..silent_consumers)
                .map(|k| Pad::new(format!("s{}", k)))
                .collect();
            chains.push(FilterChain {
                inputs: vec![Pad::input_audio(silent_index)],
                filters: vec![Filter::new("asplit", silent_consumers.to_string())],
                outputs: outputs.clone(),
            });
            outputs
        } else {
            vec![Pad::input_audio(silent_index)]
        };
        silence_pads.reverse();

        for (i, branch) in audio.iter().enumerate() {
            chains.push(video_chain(i, target));

            let audio_chain = match *branch {
                AudioBranch::Source => FilterChain {
                    inputs: vec![Pad::input_audio(i)],
                    filters: vec![Filter::new("aformat", AUDIO_FORMAT)],
                    outputs: vec![Pad::new(format!("a{}", i))],
                },
                AudioBranch::Silence { duration_secs } => FilterChain {
                    inputs: silence_pads.pop().into_iter().collect(),
                    filters: vec![
                        Filter::new("atrim", format!("duration={}", duration_secs)),
                        Filter::new("aformat", AUDIO_FORMAT),
                    ],
                    outputs: vec![Pad::new(format!("a{}", i))],
                },
            };
            chains.push(audio_chain);
        }

        let concat_inputs = (0..n)
            .flat_map(|i| [Pad::new(format!("v{}", i)), Pad::new(format!("a{}", i))])
            .collect();
        chains.push(FilterChain {
            inputs: concat_inputs,
            filters: vec![Filter::new("concat", format!("n={}:v=1:a=1", n))],
            outputs: vec![Pad::new(OUTPUT_VIDEO_PAD), Pad::new(OUTPUT_AUDIO_PAD)],
        });

        Self {
            target,
            audio,
            chains,
        }
    }

    pub fn target(&self) -> Dimensions {
        self.target
    }

    /// Number of merged inputs (excluding the silent source)
    pub fn input_count(&self) -> usize {
        self.audio.len()
    }

    pub fn audio_branches(&self) -> &[AudioBranch] {
        &self.audio
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    /// Whether the silent lavfi source must be added as an extra input
    pub fn needs_silent_source(&self) -> bool {
        self.audio
            .iter()
            .any(|branch| matches!(branch, AudioBranch::Silence { .. }))
    }

    /// Engine input index of the silent source, when present
    pub fn silent_input_index(&self) -> Option<usize> {
        self.needs_silent_source().then(|| self.input_count())
    }

    /// Render to `-filter_complex` syntax.
    pub fn render(&self) -> String {
        self.chains
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Engine inputs for `files` followed by the silent source if needed.
    pub fn engine_inputs(&self, files: &[PathBuf]) -> Vec<EngineInput> {
        let mut inputs: Vec<EngineInput> = files.iter().cloned().map(EngineInput::File).collect();
        if self.needs_silent_source() {
            inputs.push(EngineInput::Lavfi(SILENT_SOURCE));
        }
        inputs
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// One `-i` input on the engine command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineInput {
    File(PathBuf),
    /// Synthetic source read through `-f lavfi`
    Lavfi(&'static str),
}

impl EngineInput {
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::File(path) => vec!["-i".to_string(), path.to_string_lossy().into_owned()],
            Self::Lavfi(spec) => vec![
                "-f".to_string(),
                "lavfi".to_string(),
                "-i".to_string(),
                spec.to_string(),
            ],
        }
    }
}

fn video_chain(index: usize, target: Dimensions) -> FilterChain {
    let Dimensions { width, height } = target;
    FilterChain {
        inputs: vec![Pad::input_video(index)],
        filters: vec![
            Filter::new(
                "scale",
                format!("{}:{}:force_original_aspect_ratio=decrease", width, height),
            ),
            Filter::new("pad", format!("{}:{}:(ow-iw)/2:(oh-ih)/2", width, height)),
            Filter::new("setsar", "1"),
            Filter::new("fps", OUTPUT_FPS.to_string()),
        ],
        outputs: vec![Pad::new(format!("v{}", index))],
    }
}
