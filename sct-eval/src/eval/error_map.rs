//! 差值图与 MAE / ME.

use log::{debug, warn};
use ndarray::{Array3, ArrayView3, Zip};

use super::{check_geometry, ensure_dim, EvalResult};
use crate::consts::gray::is_foreground;
use crate::{BinaryMask, CtScan};

/// 掩膜内的误差统计量, 单位 HU.
///
/// 若掩膜内没有可统计的体素 (`voxels == 0`), `mae` 与 `me` 均为 NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorSummary {
    /// 平均绝对误差 (Mean Absolute Error).
    pub mae: f64,

    /// 平均误差 (Mean Error), 符号约定为 `真值 - 合成`.
    pub me: f64,

    /// 参与统计的体素个数.
    pub voxels: usize,
}

impl ErrorSummary {
    /// 统计量是否无定义 (掩膜为空)?
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.voxels == 0
    }
}

/// 计算 `gt - sct` 的逐体素差值. 两者形状必须一致, 不做广播.
pub fn difference(gt: ArrayView3<f32>, sct: ArrayView3<f32>) -> EvalResult<Array3<f32>> {
    ensure_dim(gt.dim(), sct.dim(), "ground truth CT", "synthetic CT")?;
    Ok(&gt - &sct)
}

/// 复制 `diff`, 并将掩膜外体素置为 `outside`. 不修改输入.
pub fn masked(
    diff: ArrayView3<f32>,
    mask: ArrayView3<u8>,
    outside: f32,
) -> EvalResult<Array3<f32>> {
    ensure_dim(diff.dim(), mask.dim(), "difference", "mask")?;
    let mut out = diff.to_owned();
    Zip::from(&mut out).and(mask).for_each(|d, m| {
        if !is_foreground(*m) {
            *d = outside;
        }
    });
    Ok(out)
}

/// 忽略 NaN 计算平均绝对误差和平均误差.
pub fn summarize(stats: ArrayView3<f32>) -> ErrorSummary {
    let (mut abs_sum, mut sum, mut voxels) = (0.0f64, 0.0f64, 0usize);
    for d in stats.iter().filter(|d| !d.is_nan()) {
        abs_sum += d.abs() as f64;
        sum += *d as f64;
        voxels += 1;
    }

    if voxels == 0 {
        return ErrorSummary {
            mae: f64::NAN,
            me: f64::NAN,
            voxels,
        };
    }
    ErrorSummary {
        mae: abs_sum / voxels as f64,
        me: sum / voxels as f64,
        voxels,
    }
}

/// 误差图计算结果.
///
/// 展示用差值图和统计用差值图是两份独立的数据: 前者掩膜外为填充 HU 值,
/// 后者掩膜外为 NaN.
#[derive(Debug, Clone)]
pub struct ErrorMap {
    display: CtScan,
    stats: Array3<f32>,
    summary: ErrorSummary,
}

impl ErrorMap {
    /// 计算误差图. `outside_hu` 为展示用差值图中掩膜外体素的填充值.
    ///
    /// 展示用差值图沿用 `gt` 的空间元信息. 三者几何不一致时返回
    /// [`super::EvalError::GeometryMismatch`].
    pub fn compute(
        gt: &CtScan,
        sct: &CtScan,
        mask: &BinaryMask,
        outside_hu: f32,
    ) -> EvalResult<Self> {
        check_geometry(gt, sct, mask)?;

        let diff = difference(gt.data(), sct.data())?;
        let display = gt.derive(masked(diff.view(), mask.data(), outside_hu)?);
        let stats = masked(diff.view(), mask.data(), f32::NAN)?;
        let summary = summarize(stats.view());

        if summary.is_degenerate() {
            warn!("mask selects no voxel, MAE and ME are undefined");
        } else {
            debug!(
                "error map: {} voxels, MAE = {:.3} HU, ME = {:.3} HU",
                summary.voxels, summary.mae, summary.me
            );
        }
        Ok(Self {
            display,
            stats,
            summary,
        })
    }

    /// 展示用差值图.
    #[inline]
    pub fn display(&self) -> &CtScan {
        &self.display
    }

    /// 统计用差值图, 掩膜外为 NaN.
    #[inline]
    pub fn stats(&self) -> ArrayView3<'_, f32> {
        self.stats.view()
    }

    /// MAE / ME.
    #[inline]
    pub fn summary(&self) -> ErrorSummary {
        self.summary
    }

    /// 取出展示用差值图.
    #[inline]
    pub fn into_display(self) -> CtScan {
        self.display
    }
}
