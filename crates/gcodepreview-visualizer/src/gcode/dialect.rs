//! Dialect recognition
//!
//! Slicers differ in how they mark layer changes and which metadata they
//! embed in comments. A [`DialectRegistry`] holds an ordered list of
//! recognizers; the first one whose probe accepts the head of a file
//! decides the [`DialectRules`] used for the whole parse.

use gcodepreview_core::constants::DIALECT_PROBE_BYTES;
use gcodepreview_core::Dialect;
use regex::Regex;
use std::sync::OnceLock;

/// How a dialect signals that a new layer begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerBoundary {
    /// `;LAYER:<n>` comments (Cura)
    CuraLayerMarker,
    /// `;LAYER_CHANGE` comments (PrusaSlicer family)
    LayerChangeComment,
    /// An extruding move at a Z different from the previous extrusion
    ExtrusionZChange,
}

/// Parsing rules attached to a dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectRules {
    /// Layer boundary detection
    pub layer_boundary: LayerBoundary,
    /// Honour `;WIDTH:<w>` comments as extrusion width hints
    pub width_hints: bool,
}

/// Probe deciding whether a dialect applies to the head of a file
pub type DialectProbe = fn(&str) -> bool;

/// A dialect together with its probe and rules
#[derive(Debug, Clone, Copy)]
pub struct DialectRecognizer {
    /// Dialect tag recorded on parsed documents
    pub dialect: Dialect,
    /// Content probe
    pub probe: DialectProbe,
    /// Parsing rules
    pub rules: DialectRules,
}

impl DialectRecognizer {
    /// Recognizer for Cura output
    pub fn cura() -> Self {
        Self {
            dialect: Dialect::Cura,
            probe: probe_cura,
            rules: DialectRules {
                layer_boundary: LayerBoundary::CuraLayerMarker,
                width_hints: false,
            },
        }
    }

    /// Recognizer for PrusaSlicer and its forks
    pub fn prusa_slicer() -> Self {
        Self {
            dialect: Dialect::PrusaSlicer,
            probe: probe_prusa_slicer,
            rules: DialectRules {
                layer_boundary: LayerBoundary::LayerChangeComment,
                width_hints: true,
            },
        }
    }

    /// Fallback recognizer for any file containing motion commands
    pub fn generic() -> Self {
        Self {
            dialect: Dialect::Generic,
            probe: probe_generic,
            rules: DialectRules {
                layer_boundary: LayerBoundary::ExtrusionZChange,
                width_hints: false,
            },
        }
    }

    /// Whether this recognizer accepts the given file head
    pub fn accepts(&self, head: &str) -> bool {
        (self.probe)(head)
    }
}

/// Ordered set of dialect recognizers
///
/// Recognizers are tried in registration order and the first match wins.
#[derive(Debug, Clone)]
pub struct DialectRegistry {
    recognizers: Vec<DialectRecognizer>,
}

impl DialectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            recognizers: Vec::new(),
        }
    }

    /// Registry with the built-in dialects: Cura, PrusaSlicer, Generic
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DialectRecognizer::cura());
        registry.register(DialectRecognizer::prusa_slicer());
        registry.register(DialectRecognizer::generic());
        registry
    }

    /// Append a recognizer after the existing ones
    pub fn register(&mut self, recognizer: DialectRecognizer) {
        self.recognizers.push(recognizer);
    }

    /// Registered recognizers in probe order
    pub fn recognizers(&self) -> &[DialectRecognizer] {
        &self.recognizers
    }

    /// Find the first recognizer accepting the text
    ///
    /// Only the first [`DIALECT_PROBE_BYTES`] bytes are inspected.
    pub fn detect(&self, text: &str) -> Option<&DialectRecognizer> {
        let head = probe_window(text);
        self.recognizers.iter().find(|r| r.accepts(head))
    }

    /// Find the first recognizer accepting raw file content
    ///
    /// The head is decoded lossily so files carrying stray non-UTF-8
    /// bytes (legacy encodings in slicer comments) are still recognized.
    pub fn detect_bytes(&self, source: &[u8]) -> Option<&DialectRecognizer> {
        let head = &source[..source.len().min(DIALECT_PROBE_BYTES)];
        self.detect(&String::from_utf8_lossy(head))
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn probe_window(text: &str) -> &str {
    if text.len() <= DIALECT_PROBE_BYTES {
        return text;
    }
    let mut end = DIALECT_PROBE_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn probe_cura(head: &str) -> bool {
    static CURA_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = CURA_REGEX
        .get_or_init(|| Regex::new(r"(?m)^;(FLAVOR:|LAYER:-?\d+)").expect("invalid regex pattern"));
    regex.is_match(head)
}

fn probe_prusa_slicer(head: &str) -> bool {
    static PRUSA_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PRUSA_REGEX.get_or_init(|| {
        Regex::new(r"(?m)^;LAYER_CHANGE|generated by (PrusaSlicer|SuperSlicer|OrcaSlicer|BambuStudio)")
            .expect("invalid regex pattern")
    });
    regex.is_match(head)
}

fn probe_generic(head: &str) -> bool {
    static MOTION_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = MOTION_REGEX.get_or_init(|| {
        Regex::new(r"(?mi)^[ \t]*(N\d+[ \t]*)?G0?[0-3](\D|$)").expect("invalid regex pattern")
    });
    regex.is_match(head)
}
