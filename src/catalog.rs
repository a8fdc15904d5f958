//! The fixed, ordered benchmark catalog.
//!
//! Identical in every client of the protocol: ten MNIST-sized dense networks
//! from a single small hidden layer up to four hidden layers of 2048.

use crate::topology::CaseShape;

/// `(id, layer widths)` for every catalog case, in run order.
pub const CATALOG: &[(&str, &[usize])] = &[
    ("S1", &[784, 64, 10]),
    ("S2", &[784, 128, 10]),
    ("S3", &[784, 256, 10]),
    ("M1", &[784, 256, 256, 10]),
    ("M2", &[784, 384, 384, 10]),
    ("M3", &[784, 512, 512, 10]),
    ("L1", &[784, 768, 768, 768, 10]),
    ("L2", &[784, 1024, 1024, 1024, 10]),
    ("XL1", &[784, 1536, 1536, 1536, 1536, 10]),
    ("XL2", &[784, 2048, 2048, 2048, 2048, 10]),
];

/// All catalog cases as owned shapes.
pub fn default_cases() -> Vec<CaseShape> {
    CATALOG
        .iter()
        .map(|(id, widths)| CaseShape::new(*id, widths.to_vec()))
        .collect()
}

/// Look up a catalog case by id (case-insensitive).
pub fn find_case(id: &str) -> Option<CaseShape> {
    CATALOG
        .iter()
        .find(|(case_id, _)| case_id.eq_ignore_ascii_case(id))
        .map(|(case_id, widths)| CaseShape::new(*case_id, widths.to_vec()))
}
