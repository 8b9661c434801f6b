use serde::{Deserialize, Serialize};

const NAMES_4: [&str; 4] = ["C3", "C4", "Cz", "Pz"];

const NAMES_8: [&str; 8] = ["C5", "C6", "C3", "C1", "FC3", "C4", "C2", "FC4"];

const NAMES_32: [&str; 32] = [
    "F3", "F1", "Fz", "FC1", "FCz", "Cz", "P5", "CP5", "CP3", "CP1", "FC3", "FC5", "C5", "C3",
    "C1", "P1", "C4", "C6", "CP6", "CP4", "CP2", "CPz", "AFz", "F4", "F2", "C2", "FC6", "FC4",
    "FC2", "Pz", "P2", "P6",
];

const NAMES_64: [&str; 64] = [
    "Fp1", "AF7", "AF3", "F1", "F3", "F5", "F7", "FT7", "FC5", "FC3", "FC1", "C1", "C3", "C5",
    "T7", "TP7", "CP5", "CP3", "CP1", "P1", "P3", "P5", "P7", "P9", "PO7", "PO3", "O1", "Iz",
    "Oz", "POz", "Pz", "CPz", "Fpz", "Fp2", "AF8", "AF4", "AFz", "Fz", "F2", "F4", "F6", "F8",
    "FT8", "FC6", "FC4", "FC2", "FCz", "Cz", "C2", "C4", "C6", "T8", "TP8", "CP6", "CP4", "CP2",
    "P2", "P4", "P6", "P8", "P10", "PO8", "PO4", "O2",
];

/// The four electrode montages an acquisition stream may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    Four,
    Eight,
    ThirtyTwo,
    SixtyFour,
}

impl ChannelLayout {
    pub const ALL: [ChannelLayout; 4] = [
        ChannelLayout::Four,
        ChannelLayout::Eight,
        ChannelLayout::ThirtyTwo,
        ChannelLayout::SixtyFour,
    ];

    /// Detects the layout from a stream's channel count. Any count outside
    /// the supported set has no layout.
    pub fn from_channel_count(count: usize) -> Option<Self> {
        match count {
            4 => Some(ChannelLayout::Four),
            8 => Some(ChannelLayout::Eight),
            32 => Some(ChannelLayout::ThirtyTwo),
            64 => Some(ChannelLayout::SixtyFour),
            _ => None,
        }
    }

    pub fn channel_count(self) -> usize {
        self.channel_names().len()
    }

    pub fn channel_names(self) -> &'static [&'static str] {
        match self {
            ChannelLayout::Four => &NAMES_4,
            ChannelLayout::Eight => &NAMES_8,
            ChannelLayout::ThirtyTwo => &NAMES_32,
            ChannelLayout::SixtyFour => &NAMES_64,
        }
    }

    /// Unit-sphere electrode positions in channel order.
    pub fn positions(self) -> Vec<[f64; 3]> {
        self.channel_names()
            .iter()
            .filter_map(|name| electrode_position(name))
            .collect()
    }
}

/// Approximate position of a 10-10 electrode on a unit sphere.
///
/// Axes: `x` toward the right ear, `y` toward the nasion, `z` toward the
/// vertex. The label's row prefix fixes the point along the nasion–inion arc;
/// its number walks along the great circle from the midline down to the
/// circumference, odd numbers on the left, even on the right.
pub fn electrode_position(name: &str) -> Option<[f64; 3]> {
    let split = name
        .find(|c: char| c.is_ascii_digit() || c == 'z' || c == 'Z')
        .filter(|i| *i > 0)?;
    let (row, column) = name.split_at(split);

    let fraction = match row.to_ascii_uppercase().as_str() {
        "FP" => 0.1,
        "AF" => 0.2,
        "F" => 0.3,
        "FC" | "FT" => 0.4,
        "C" | "T" => 0.5,
        "CP" | "TP" => 0.6,
        "P" => 0.7,
        "PO" => 0.8,
        "O" => 0.9,
        "I" => 1.0,
        _ => return None,
    };
    let rim_row = matches!(row.to_ascii_uppercase().as_str(), "FP" | "O" | "I");

    let sagittal = (fraction - 0.5) * std::f64::consts::PI;
    let midline = [0.0, -sagittal.sin(), sagittal.cos()];
    if column.eq_ignore_ascii_case("z") {
        return Some(midline);
    }

    let number: u32 = column.parse().ok().filter(|n| *n > 0)?;
    let left = number % 2 == 1;
    let step = f64::from(number.div_ceil(2));
    let along = if rim_row { 1.0 } else { step / 4.0 };

    // Circumference point for this row, lifted toward the front/back poles
    // so the rim passes through Fpz and Oz.
    let azimuth = fraction * std::f64::consts::PI;
    let side = if left { -1.0 } else { 1.0 };
    let rim = normalize([
        side * azimuth.sin(),
        azimuth.cos(),
        0.309 * azimuth.cos().abs(),
    ]);

    Some(normalize(slerp(midline, rim, along)))
}

fn slerp(a: [f64; 3], b: [f64; 3], t: f64) -> [f64; 3] {
    let dot = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).clamp(-1.0, 1.0);
    let omega = dot.acos();
    if omega.abs() < 1e-9 {
        return a;
    }
    let wa = ((1.0 - t) * omega).sin() / omega.sin();
    let wb = (t * omega).sin() / omega.sin();
    [
        wa * a[0] + wb * b[0],
        wa * a[1] + wb * b[1],
        wa * a[2] + wb * b[2],
    ]
}

fn normalize(v: [f64; 3]) -> [f64; 3] {
    let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    [v[0] / norm, v[1] / norm, v[2] / norm]
}
