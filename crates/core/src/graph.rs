//! Typed outcome of a graph script.
//!
//! Every variant is ready for rendering; an empty chart is never a success,
//! it is reported through [`GraphResult::Error`].

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::data_point::DataPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphResult {
    LineGraph(LineGraphData),
    PieChart(PieChartData),
    TimeBarChart(TimeBarChartData),
    Text(TextData),
    DataPoint(DataPointData),
    Error(GraphFailure),
}

impl GraphResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn failure(&self) -> Option<&GraphFailure> {
        match self {
            Self::Error(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Where a graph execution went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// No interpreter could be leased.
    Lease,
    /// The script failed to parse or a module could not be resolved.
    Resolution,
    /// The script raised an error while running.
    Execution,
    /// The script returned something that is not a valid graph.
    Decode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphFailure {
    pub stage: FailureStage,
    pub diagnostic: String,
}

impl fmt::Display for GraphFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.stage, self.diagnostic)
    }
}

// ============================================================================
// Shared pieces
// ============================================================================

/// A palette index or an explicit ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpec {
    Palette(u32),
    Argb(u32),
}

impl ColorSpec {
    /// Parse `#RRGGBB` or `#AARRGGBB`.
    pub fn from_hex(text: &str) -> Option<Self> {
        let digits = text.strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let raw = u32::from_str_radix(digits, 16).ok()?;
        match digits.len() {
            6 => Some(Self::Argb(0xFF00_0000 | raw)),
            8 => Some(Self::Argb(raw)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "DAY" => Some(Self::Day),
            "WEEK" => Some(Self::Week),
            "MONTH" => Some(Self::Month),
            "YEAR" => Some(Self::Year),
            _ => None,
        }
    }
}

/// Optional fixed y-axis bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

// ============================================================================
// Line graph
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinePointStyle {
    None,
    Circle,
    CircleValue,
    CirclesOnly,
}

impl LinePointStyle {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "circle" => Some(Self::Circle),
            "circle_value" => Some(Self::CircleValue),
            "circles_only" => Some(Self::CirclesOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub timestamp: DateTime<FixedOffset>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub points: Vec<LinePoint>,
    pub color: Option<ColorSpec>,
    /// `None` leaves the renderer's default.
    pub point_style: Option<LinePointStyle>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGraphData {
    pub lines: Vec<Line>,
    pub range_bounds: Option<RangeBounds>,
    pub duration_based_range: bool,
}

// ============================================================================
// Pie chart
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSegment {
    pub value: f64,
    pub label: String,
    pub color: Option<ColorSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieChartData {
    pub segments: Vec<PieSegment>,
}

// ============================================================================
// Time bar chart
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSegment {
    pub value: f64,
    pub label: Option<String>,
    pub color: Option<ColorSpec>,
}

/// Width of one bar: a fixed duration or a number of calendar periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarWidth {
    Millis(i64),
    Period { period: Period, multiple: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBarChartData {
    /// Newest bar first; each bar is one or more stacked segments.
    pub bars: Vec<Vec<BarSegment>>,
    pub end_time: DateTime<FixedOffset>,
    pub bar_width: BarWidth,
    pub y_max: Option<f64>,
    pub duration_based_range: bool,
}

// ============================================================================
// Text and single data point
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlignment {
    Start,
    #[default]
    Center,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: Option<String>,
    pub size: TextSize,
    pub alignment: TextAlignment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPointData {
    pub point: DataPoint,
    pub is_duration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse() {
        assert_eq!(ColorSpec::from_hex("#FF0000"), Some(ColorSpec::Argb(0xFFFF_0000)));
        assert_eq!(ColorSpec::from_hex("#80FF0000"), Some(ColorSpec::Argb(0x80FF_0000)));
        assert_eq!(ColorSpec::from_hex("FF0000"), None);
        assert_eq!(ColorSpec::from_hex("#FF00"), None);
        assert_eq!(ColorSpec::from_hex("#GG0000"), None);
    }

    #[test]
    fn period_names_are_case_insensitive() {
        assert_eq!(Period::from_name("week"), Some(Period::Week));
        assert_eq!(Period::from_name("FORTNIGHT"), None);
    }

    #[test]
    fn error_result_exposes_failure() {
        let result = GraphResult::Error(GraphFailure {
            stage: FailureStage::Decode,
            diagnostic: "no lines".into(),
        });
        assert!(result.is_error());
        assert_eq!(result.failure().map(|f| f.diagnostic.as_str()), Some("no lines"));
    }
}
