//! Histograms, categorical distributions and Likert tallies.

use crate::models::{CellValue, PredictionRow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Number of bins the histogram aims for.
const TARGET_BINS: f64 = 6.0;

/// One histogram bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// Label such as `"40-50s"`.
    pub range: String,
    pub start: i64,
    pub count: usize,
}

/// Bins the numeric values of `column` into roughly six ranges.
///
/// The bin width is rounded up to a multiple of 10 and is never below 1.
/// Non-numeric cells are ignored.
pub fn compute_histogram(rows: &[PredictionRow], column: &str) -> Vec<HistogramBin> {
    let values: Vec<f64> = rows.iter().filter_map(|r| r.number(column)).collect();

    let Some(max) = values.iter().copied().reduce(f64::max) else {
        return Vec::new();
    };

    let width = ((max / TARGET_BINS / 10.0).ceil() * 10.0).max(1.0);

    let mut bins: BTreeMap<i64, usize> = BTreeMap::new();
    for v in &values {
        let start = ((v / width).floor() * width) as i64;
        *bins.entry(start).or_default() += 1;
    }

    // Starts and width saturate at the i64 range for huge values.
    let width = width as i64;
    bins.into_iter()
        .map(|(start, count)| HistogramBin {
            range: format!("{}-{}s", start, start.saturating_add(width)),
            start,
            count,
        })
        .collect()
}

/// One slice of a categorical (pie) chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySlice {
    pub id: String,
    pub label: String,
    pub value: usize,
    /// Display colour as `#rrggbb`.
    pub color: String,
}

/// Deterministically assigns categories to a row.
pub trait Classifier {
    /// Categories found in the row; empty when the row does not qualify.
    fn classify(&self, row: &PredictionRow) -> Vec<String>;

    /// Display colour of a category.
    fn color(&self, category: &str) -> String;
}

/// Counts rows per category, largest category first.
pub fn compute_categorical_distribution<C: Classifier + ?Sized>(
    rows: &[PredictionRow],
    classifier: &C,
) -> Vec<CategorySlice> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for row in rows {
        for category in classifier.classify(row) {
            *counts.entry(category).or_default() += 1;
        }
    }

    let mut slices: Vec<CategorySlice> = counts
        .into_iter()
        .map(|(category, value)| CategorySlice {
            color: classifier.color(&category),
            id: category.clone(),
            label: category,
            value,
        })
        .collect();

    slices.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.label.cmp(&b.label)));
    slices
}

/// Hue-based colour families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFamily {
    Black,
    White,
    Gray,
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Violet,
    Magenta,
}

impl ColorFamily {
    const ALL: [ColorFamily; 11] = [
        ColorFamily::Black,
        ColorFamily::White,
        ColorFamily::Gray,
        ColorFamily::Red,
        ColorFamily::Orange,
        ColorFamily::Yellow,
        ColorFamily::Green,
        ColorFamily::Cyan,
        ColorFamily::Blue,
        ColorFamily::Violet,
        ColorFamily::Magenta,
    ];

    /// Classify an 8-bit RGB colour.
    pub fn from_rgb(r: f64, g: f64, b: f64) -> Self {
        let (h, s, l) = rgb_to_hsl(r, g, b);

        if l < 0.1 {
            ColorFamily::Black
        } else if l > 0.95 {
            ColorFamily::White
        } else if s < 0.1 {
            ColorFamily::Gray
        } else if !(20.0..340.0).contains(&h) {
            ColorFamily::Red
        } else if h < 40.0 {
            ColorFamily::Orange
        } else if h < 65.0 {
            ColorFamily::Yellow
        } else if h < 150.0 {
            ColorFamily::Green
        } else if h < 190.0 {
            ColorFamily::Cyan
        } else if h < 260.0 {
            ColorFamily::Blue
        } else if h < 290.0 {
            ColorFamily::Violet
        } else {
            ColorFamily::Magenta
        }
    }

    /// Swatch used when charting the family.
    pub fn swatch(&self) -> &'static str {
        match self {
            ColorFamily::Black => "#1f2937",
            ColorFamily::White => "#d1d5db",
            ColorFamily::Gray => "#9ca3af",
            ColorFamily::Red => "#ef4444",
            ColorFamily::Orange => "#f97316",
            ColorFamily::Yellow => "#eab308",
            ColorFamily::Green => "#22c55e",
            ColorFamily::Cyan => "#06b6d4",
            ColorFamily::Blue => "#3b82f6",
            ColorFamily::Violet => "#8b5cf6",
            ColorFamily::Magenta => "#d946ef",
        }
    }

    /// Human-readable classification rule.
    pub fn rule(&self) -> &'static str {
        match self {
            ColorFamily::Black => "Lightness < 10%",
            ColorFamily::White => "Lightness > 95%",
            ColorFamily::Gray => "Saturation < 10%",
            ColorFamily::Red => "Hue 340°-20°",
            ColorFamily::Orange => "Hue 20°-40°",
            ColorFamily::Yellow => "Hue 40°-65°",
            ColorFamily::Green => "Hue 65°-150°",
            ColorFamily::Cyan => "Hue 150°-190°",
            ColorFamily::Blue => "Hue 190°-260°",
            ColorFamily::Violet => "Hue 260°-290°",
            ColorFamily::Magenta => "Hue 290°-340°",
        }
    }

    /// Inverse of the `Display` name.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.to_string() == label)
    }
}

impl fmt::Display for ColorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorFamily::Black => "Black",
            ColorFamily::White => "White",
            ColorFamily::Gray => "Gray",
            ColorFamily::Red => "Red",
            ColorFamily::Orange => "Orange",
            ColorFamily::Yellow => "Yellow",
            ColorFamily::Green => "Green",
            ColorFamily::Cyan => "Cyan",
            ColorFamily::Blue => "Blue",
            ColorFamily::Violet => "Violet/Purple",
            ColorFamily::Magenta => "Pink/Magenta",
        };
        write!(f, "{}", name)
    }
}

/// Converts 8-bit RGB to (hue degrees, saturation, lightness).
pub fn rgb_to_hsl(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let (r, g, b) = (r / 255.0, g / 255.0, b / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h / 6.0 * 360.0, s, l)
}

/// Parses `#rrggbb` (the `#` is optional).
pub fn parse_hex_color(value: &str) -> Option<(f64, f64, f64)> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok().map(f64::from);
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Classifies colour columns into [`ColorFamily`] names.
///
/// Each `<base>_R/_G/_B` triplet with three numeric channels counts once,
/// as does a hex colour column holding `#rrggbb`.
#[derive(Debug, Clone, Default)]
pub struct ColorFamilyClassifier {
    pub triplet_bases: Vec<String>,
    pub hex_column: Option<String>,
}

impl Classifier for ColorFamilyClassifier {
    fn classify(&self, row: &PredictionRow) -> Vec<String> {
        let mut families = Vec::new();

        for base in &self.triplet_bases {
            let channels = (
                row.number(&format!("{}_R", base)),
                row.number(&format!("{}_G", base)),
                row.number(&format!("{}_B", base)),
            );
            if let (Some(r), Some(g), Some(b)) = channels {
                families.push(ColorFamily::from_rgb(r, g, b).to_string());
            }
        }

        if let Some(ref column) = self.hex_column {
            if let Some(CellValue::Text(hex)) = row.cell(column) {
                if let Some((r, g, b)) = parse_hex_color(hex) {
                    families.push(ColorFamily::from_rgb(r, g, b).to_string());
                }
            }
        }

        families
    }

    fn color(&self, category: &str) -> String {
        ColorFamily::from_label(category)
            .map(|f| f.swatch())
            .unwrap_or("#64748b")
            .to_string()
    }
}

/// Response counts of one Likert column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikertRow {
    pub metric: String,
    /// Counts of responses "1" through "5".
    pub counts: [usize; 5],
}

impl LikertRow {
    /// Count of a 1-based response value.
    pub fn count(&self, response: usize) -> usize {
        response
            .checked_sub(1)
            .and_then(|i| self.counts.get(i))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Answer keys of a Likert item, lowest first.
const LIKERT_KEYS: [&str; 5] = ["1", "2", "3", "4", "5"];

/// Tallies responses 1-5 for each column present in the first row.
///
/// A cell counts when its text form is exactly one of `"1"`..`"5"`.
/// Columns missing from the first row are left out entirely.
pub fn compute_likert_table(rows: &[PredictionRow], columns: &[String]) -> Vec<LikertRow> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    columns
        .iter()
        .filter(|c| first.original_data.contains_key(c.as_str()))
        .map(|column| {
            let mut counts = [0usize; 5];
            for row in rows {
                let key = row.cell(column).map(CellValue::as_key);
                if let Some(i) = key
                    .as_deref()
                    .and_then(|k| LIKERT_KEYS.iter().position(|l| *l == k))
                {
                    counts[i] += 1;
                }
            }
            LikertRow {
                metric: column.clone(),
                counts,
            }
        })
        .collect()
}
