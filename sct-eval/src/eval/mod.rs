//! 合成 CT 精度评估.
//!
//! [`evaluate`] 串联整个流程: 几何检查, 掩膜二值化, 误差图与 MAE / ME,
//! 以及多阈值骨分割 Dice 扫描. 后两者只读地共享输入, 相互独立.

mod config;
mod error;
pub mod error_map;
pub mod overlap;

use log::info;

pub use config::EvalConfig;
pub use error::EvalError;
pub use error_map::{ErrorMap, ErrorSummary};
pub use overlap::{NoMonitor, OverlapPoint, OverlapSeries, OverlapSweep, SweepMonitor};

use crate::{BinaryMask, CtLabel, CtScan, Geometry, Idx3d, NiftiHeaderAttr};

/// 评估运行时错误.
pub type EvalResult<T> = Result<T, EvalError>;

/// 检查 `left` 与 `right` 几何是否一致.
fn ensure_same(
    left: &Geometry,
    right: &Geometry,
    left_role: &'static str,
    right_role: &'static str,
) -> EvalResult<()> {
    match left.mismatch(right) {
        None => Ok(()),
        Some(attribute) => Err(EvalError::GeometryMismatch {
            left: left_role,
            right: right_role,
            attribute,
        }),
    }
}

/// 检查两个裸数组的形状是否一致.
pub(crate) fn ensure_dim(
    left: Idx3d,
    right: Idx3d,
    left_role: &'static str,
    right_role: &'static str,
) -> EvalResult<()> {
    if left == right {
        Ok(())
    } else {
        Err(EvalError::GeometryMismatch {
            left: left_role,
            right: right_role,
            attribute: "shape",
        })
    }
}

/// 检查真值 CT, 合成 CT 和掩膜三者的几何是否一致.
pub(crate) fn check_geometry(gt: &CtScan, sct: &CtScan, mask: &BinaryMask) -> EvalResult<()> {
    let reference = gt.geometry();
    ensure_same(&reference, &sct.geometry(), "ground truth CT", "synthetic CT")?;
    ensure_same(&reference, mask.geometry(), "ground truth CT", "mask")
}

/// 一次评估的全部结果.
#[derive(Debug, Clone)]
pub struct EvalReport {
    error_map: ErrorMap,
    overlap: OverlapSeries,
    mask_voxels: usize,
}

impl EvalReport {
    /// 平均绝对误差 (HU). 掩膜为空时为 NaN.
    #[inline]
    pub fn mae(&self) -> f64 {
        self.error_map.summary().mae
    }

    /// 平均误差 (HU), 符号约定为 `真值 - 合成`. 掩膜为空时为 NaN.
    #[inline]
    pub fn me(&self) -> f64 {
        self.error_map.summary().me
    }

    /// MAE / ME 及参与统计的体素数.
    #[inline]
    pub fn summary(&self) -> ErrorSummary {
        self.error_map.summary()
    }

    /// 误差图 (展示用和统计用).
    #[inline]
    pub fn error_map(&self) -> &ErrorMap {
        &self.error_map
    }

    /// 展示用差值图. 沿用真值 CT 的空间元信息, 掩膜外为填充 HU 值.
    #[inline]
    pub fn difference(&self) -> &CtScan {
        self.error_map.display()
    }

    /// "阈值 - Dice" 曲线.
    #[inline]
    pub fn overlap(&self) -> &OverlapSeries {
        &self.overlap
    }

    /// 二值掩膜中前景体素的个数.
    #[inline]
    pub fn mask_voxels(&self) -> usize {
        self.mask_voxels
    }

    /// 拆分为展示用差值图和 Dice 曲线.
    #[inline]
    pub fn into_parts(self) -> (CtScan, OverlapSeries) {
        (self.error_map.into_display(), self.overlap)
    }
}

/// 运行完整评估. 见 [`evaluate_with`].
#[inline]
pub fn evaluate(
    gt: &CtScan,
    sct: &CtScan,
    label: &CtLabel,
    config: &EvalConfig,
) -> EvalResult<EvalReport> {
    evaluate_with(gt, sct, label, config, &NoMonitor)
}

/// 运行完整评估, 并在 Dice 扫描的阈值之间轮询 `monitor`.
///
/// 1. 检查参数与三者几何, 任一不合法则直接返回错误;
/// 2. 由 `label` 得到二值掩膜 (`config.collapse_labels` 为真时先合并多值标签);
/// 3. 计算误差图与 MAE / ME;
/// 4. 按 `config.thresholds` 的顺序计算 Dice 曲线.
///
/// 开启 `rayon` feature 且 `config.parallel` 为真时, 3 和 4 并行执行.
/// 输入数据不会被修改.
pub fn evaluate_with<M: SweepMonitor + ?Sized>(
    gt: &CtScan,
    sct: &CtScan,
    label: &CtLabel,
    config: &EvalConfig,
    monitor: &M,
) -> EvalResult<EvalReport> {
    config.validate()?;
    let reference = gt.geometry();
    ensure_same(&reference, &sct.geometry(), "ground truth CT", "synthetic CT")?;
    ensure_same(&reference, &label.geometry(), "ground truth CT", "mask label")?;

    let mask = if config.collapse_labels {
        label.collapsed().binarize()
    } else {
        label.binarize()
    };
    let mask_voxels = mask.count();

    let error_map = || ErrorMap::compute(gt, sct, &mask, config.outside_hu);
    let overlap = || {
        OverlapSweep::from_config(gt, sct, &mask, config)?.run_with(&config.thresholds, monitor)
    };

    #[cfg(feature = "rayon")]
    let (error_map, overlap) = if config.parallel {
        rayon::join(error_map, overlap)
    } else {
        (error_map(), overlap())
    };
    #[cfg(not(feature = "rayon"))]
    let (error_map, overlap) = (error_map(), overlap());
    let (error_map, overlap) = (error_map?, overlap?);

    let summary = error_map.summary();
    info!(
        "evaluated {} mask voxels: MAE = {:.1} HU, ME = {:.1} HU, {} thresholds",
        mask_voxels,
        summary.mae,
        summary.me,
        overlap.len()
    );
    Ok(EvalReport {
        error_map,
        overlap,
        mask_voxels,
    })
}
