//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::{BinaryMask, CtLabel, CtScan, Geometry, NiftiHeaderAttr};

pub use crate::consts::{default_thresholds, AIR_HU, BONE_CEILING_HU, EMPTY_DICE};

pub use crate::eval::{
    evaluate, evaluate_with, EvalConfig, EvalError, EvalReport, EvalResult, ErrorSummary,
    OverlapPoint, OverlapSeries, OverlapSweep, SweepMonitor,
};

pub use crate::dataset::{case_loader, EvalCase};
