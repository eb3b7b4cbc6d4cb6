//! Per-line annotation repair.

use thiserror::Error;

use super::infer::{resolve_box, CoordinateSystem, InferenceMode};
use crate::geometry::{BoundingBox, ImageDimensions, LABEL_DECIMALS};

/// Class assigned when the class token is missing or not numeric.
pub const DEFAULT_CLASS: i64 = 0;

/// Why a raw annotation line was dropped.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SkipReason {
    #[error("expected 4 coordinates, found {0}")]
    TooFewCoordinates(usize),
    #[error("unparsable coordinate '{0}'")]
    UnparsableCoordinate(String),
    #[error("pixel coordinates without image dimensions")]
    MissingImageDimensions,
    #[error("ambiguous pixel geometry")]
    AmbiguousGeometry,
}

/// One repaired annotation line.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelRecord {
    pub class_id: i64,
    pub bbox: BoundingBox,
    pub raw_tokens: Vec<String>,
    pub system: CoordinateSystem,
    /// The box violated the canonical invariant and was clamped.
    pub clamped: bool,
}

impl LabelRecord {
    pub fn to_line(&self) -> String {
        self.bbox.to_label_line(self.class_id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LineOutcome {
    Parsed(LabelRecord),
    Skipped(SkipReason),
}

/// Per-file inputs shared by every line of an annotation file.
#[derive(Clone, Copy, Debug)]
pub struct LineContext {
    pub dims: Option<ImageDimensions>,
    pub num_classes: u32,
    pub mode: InferenceMode,
}

impl LineContext {
    pub fn single_class(dims: Option<ImageDimensions>) -> Self {
        Self {
            dims,
            num_classes: 1,
            mode: InferenceMode::BestGuess,
        }
    }
}

/// Split on whitespace, treating commas as whitespace.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .collect()
}

/// Repair one raw line. Returns `None` for blank lines.
pub fn repair_line(line: &str, ctx: &LineContext) -> Option<LineOutcome> {
    let mut tokens = tokenize(line);
    if tokens.is_empty() {
        return None;
    }

    // Four bare numbers: the class column is missing.
    if tokens.len() == 4 && tokens.iter().all(|t| parse_number(t).is_some()) {
        tokens.insert(0, "0");
    }

    let class_id = if ctx.num_classes <= 1 {
        DEFAULT_CLASS
    } else {
        parse_number(tokens[0])
            .map(|v| v.trunc() as i64)
            .unwrap_or(DEFAULT_CLASS)
    };

    let coords = &tokens[1..];
    if coords.len() < 4 {
        return Some(LineOutcome::Skipped(SkipReason::TooFewCoordinates(
            coords.len(),
        )));
    }

    let mut values = [0.0f64; 4];
    for (slot, token) in values.iter_mut().zip(coords.iter().take(4)) {
        match parse_number(token) {
            Some(v) => *slot = v,
            None => {
                return Some(LineOutcome::Skipped(SkipReason::UnparsableCoordinate(
                    token.to_string(),
                )))
            }
        }
    }

    let (system, bbox) = match resolve_box(values, ctx.dims, ctx.mode) {
        Ok(resolved) => resolved,
        Err(reason) => return Some(LineOutcome::Skipped(reason)),
    };

    // Validate at output precision so the written line holds the invariant.
    let bbox = bbox.rounded(LABEL_DECIMALS);
    let clamped = !bbox.is_canonical();
    let bbox = if clamped { bbox.clamped() } else { bbox };

    Some(LineOutcome::Parsed(LabelRecord {
        class_id,
        bbox,
        raw_tokens: tokens.iter().map(|t| t.to_string()).collect(),
        system,
        clamped,
    }))
}

fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hd() -> LineContext {
        LineContext::single_class(Some(ImageDimensions::new(1280, 720)))
    }

    fn parsed(line: &str, ctx: &LineContext) -> LabelRecord {
        match repair_line(line, ctx) {
            Some(LineOutcome::Parsed(record)) => record,
            other => panic!("expected parsed line for {line:?}, got {other:?}"),
        }
    }

    fn skipped(line: &str, ctx: &LineContext) -> SkipReason {
        match repair_line(line, ctx) {
            Some(LineOutcome::Skipped(reason)) => reason,
            other => panic!("expected skipped line for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn pixel_center_line_with_class_name() {
        let record = parsed("car 640 360 320 240", &hd());
        assert_eq!(record.to_line(), "0 0.500000 0.500000 0.250000 0.333333");
        assert_eq!(record.system, CoordinateSystem::CenterPixels);
        assert!(!record.clamped);
    }

    #[test]
    fn single_class_coerces_every_class_token() {
        for class in ["car", "2", "-1", "3.7"] {
            let record = parsed(&format!("{class} 0.5 0.5 0.1 0.1"), &hd());
            assert_eq!(record.class_id, 0, "class token {class}");
        }
    }

    #[test]
    fn multi_class_truncates_float_classes() {
        let ctx = LineContext {
            num_classes: 4,
            ..hd()
        };
        assert_eq!(parsed("2.9 0.5 0.5 0.1 0.1", &ctx).class_id, 2);
        assert_eq!(parsed("truck 0.5 0.5 0.1 0.1", &ctx).class_id, 0);
    }

    #[test]
    fn four_numbers_gain_a_class() {
        let record = parsed("0.5 0.4 0.2 0.1", &hd());
        assert_eq!(record.to_line(), "0 0.500000 0.400000 0.200000 0.100000");
        assert_eq!(record.raw_tokens[0], "0");
    }

    #[test]
    fn commas_are_separators() {
        let record = parsed("0,0.5, 0.5,0.2 ,0.2", &hd());
        assert_eq!(record.to_line(), "0 0.500000 0.500000 0.200000 0.200000");
    }

    #[test]
    fn extra_tokens_are_dropped() {
        let record = parsed("0 0.5 0.5 0.2 0.2 0.93 7", &hd());
        assert_eq!(record.to_line(), "0 0.500000 0.500000 0.200000 0.200000");
    }

    #[test]
    fn short_lines_are_skipped() {
        assert_eq!(
            skipped("0 0.5 0.5", &hd()),
            SkipReason::TooFewCoordinates(2)
        );
        assert_eq!(
            skipped("car 0.5 0.5 0.2", &hd()),
            SkipReason::TooFewCoordinates(3)
        );
    }

    #[test]
    fn unparsable_coordinates_are_skipped() {
        assert_eq!(
            skipped("0 0.5 abc 0.2 0.2", &hd()),
            SkipReason::UnparsableCoordinate("abc".into())
        );
        assert_eq!(
            skipped("0 0.5 NaN 0.2 0.2", &hd()),
            SkipReason::UnparsableCoordinate("NaN".into())
        );
    }

    #[test]
    fn out_of_range_geometry_is_clamped() {
        let record = parsed("0 0.5 0.5 0 1.0", &hd());
        assert!(record.clamped);
        assert_eq!(record.to_line(), "0 0.500000 0.500000 0.000001 1.000000");
    }

    #[test]
    fn blank_lines_produce_nothing() {
        assert!(repair_line("   \t ", &hd()).is_none());
        assert!(repair_line(",,", &hd()).is_none());
    }

    #[test]
    fn canonical_line_round_trips() {
        let line = "0 0.123457 0.900000 0.000001 1.000000";
        assert_eq!(parsed(line, &hd()).to_line(), line);
    }
}
