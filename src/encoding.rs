//! Residue feature encoding.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Amino acid alphabet of the one-hot block; `X` is the fallback for anything else.
pub const ALPHABET: [char; 21] = [
    'A', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'V', 'W',
    'Y', 'X',
];

/// Number of physico-chemical columns appended by [`Encoding::OneHotMeiler`].
pub const NUM_MEILER_FEATURES: usize = 7;

/// Column of a one-letter code in [`ALPHABET`]; anything unknown maps to `X`.
#[rustfmt::skip]
pub fn aa1_to_int(aa: char) -> usize {
    match aa.to_ascii_uppercase() {
        'A' => 0,  'C' => 1,  'D' => 2,
        'E' => 3,  'F' => 4,  'G' => 5,
        'H' => 6,  'I' => 7,  'K' => 8,
        'L' => 9,  'M' => 10, 'N' => 11,
        'P' => 12, 'Q' => 13, 'R' => 14,
        'S' => 15, 'T' => 16, 'V' => 17,
        'W' => 18, 'Y' => 19, _   => 20,
    }
}

/// Meiler et al. (2001) parameters: steric, polarizability, volume,
/// hydrophobicity, isoelectric point, helix and sheet probability.
#[rustfmt::skip]
pub fn meiler_features(aa: char) -> [f32; NUM_MEILER_FEATURES] {
    match aa.to_ascii_uppercase() {
        'A' => [1.28, 0.05, 1.00,  0.31,  6.11, 0.42, 0.23],
        'C' => [1.77, 0.13, 2.43,  1.54,  6.35, 0.17, 0.41],
        'D' => [1.60, 0.11, 2.78, -0.77,  2.95, 0.25, 0.20],
        'E' => [1.56, 0.15, 3.78, -0.64,  3.09, 0.42, 0.21],
        'F' => [2.94, 0.29, 5.89,  1.79,  5.67, 0.30, 0.38],
        'G' => [0.00, 0.00, 0.00,  0.00,  6.07, 0.13, 0.15],
        'H' => [2.99, 0.23, 4.66,  0.13,  7.69, 0.27, 0.30],
        'I' => [4.19, 0.19, 4.00,  1.80,  6.04, 0.30, 0.45],
        'K' => [1.89, 0.22, 4.77, -0.99,  9.99, 0.32, 0.27],
        'L' => [2.59, 0.19, 4.00,  1.70,  6.04, 0.39, 0.31],
        'M' => [2.35, 0.22, 4.43,  1.23,  5.71, 0.38, 0.32],
        'N' => [1.60, 0.13, 2.95, -0.60,  6.52, 0.21, 0.22],
        'P' => [2.67, 0.00, 2.72,  0.72,  6.80, 0.13, 0.34],
        'Q' => [1.56, 0.18, 3.95, -0.22,  5.65, 0.36, 0.25],
        'R' => [2.34, 0.29, 6.13, -1.01, 10.74, 0.36, 0.25],
        'S' => [1.31, 0.06, 1.60, -0.04,  5.70, 0.20, 0.28],
        'T' => [3.03, 0.11, 2.60,  0.26,  5.60, 0.21, 0.36],
        'V' => [3.67, 0.14, 3.00,  1.22,  6.02, 0.27, 0.49],
        'W' => [3.21, 0.41, 8.08,  2.25,  5.94, 0.32, 0.42],
        'Y' => [2.94, 0.30, 6.47,  0.96,  5.66, 0.25, 0.41],
        _   => [0.0; NUM_MEILER_FEATURES],
    }
}

/// Maps a one-letter residue sequence to a `(len, num_features)` matrix.
pub trait FeatureEncoder {
    /// Width `F` of every encoded row.
    fn num_features(&self) -> usize;

    /// Encode one row per residue letter. Unknown letters use the `X` encoding.
    fn encode(&self, seq: &str) -> Array2<f32>;
}

/// Built-in residue encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// 21-column one-hot over the amino acid alphabet
    OneHot,
    /// One-hot followed by the seven Meiler physico-chemical parameters
    #[default]
    OneHotMeiler,
}

impl FeatureEncoder for Encoding {
    fn num_features(&self) -> usize {
        match self {
            Encoding::OneHot => ALPHABET.len(),
            Encoding::OneHotMeiler => ALPHABET.len() + NUM_MEILER_FEATURES,
        }
    }

    fn encode(&self, seq: &str) -> Array2<f32> {
        let n = seq.chars().count();
        let mut mat = Array2::<f32>::zeros((n, self.num_features()));

        for (i, aa) in seq.chars().enumerate() {
            mat[[i, aa1_to_int(aa)]] = 1.0;
            if let Encoding::OneHotMeiler = self {
                for (j, v) in meiler_features(aa).into_iter().enumerate() {
                    mat[[i, ALPHABET.len() + j]] = v;
                }
            }
        }
        mat
    }
}
