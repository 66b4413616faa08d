//! 掩膜二值化.

use log::warn;
use ndarray::{Array3, ArrayView, ArrayView3, Ix3};

use super::{CtLabel, Geometry, NiftiHeaderAttr};
use crate::consts::gray::{is_foreground, MASK_BACKGROUND, MASK_FOREGROUND};

/// 将任意取值的标签体数据转换为严格的 0/1 掩膜.
///
/// 算法: 减去全局最小值, 除以平移后的全局最大值, 归一化值 `> 0.5` 的体素置为
/// [`MASK_FOREGROUND`], 其余置为 [`MASK_BACKGROUND`]. 这等价于以数据自身的中点为阈值,
/// 因此对标签编码 (`{0, 1}`, `{0, 255}` 等) 不敏感, 但调用者应当提供实质上二值的标签.
///
/// # 退化情形
///
/// 1. 非有限值 (NaN, inf) 视为背景, 且不参与最小值/最大值的统计.
/// 2. 常数体数据 (平移后最大值为 0): 常数大于 0 时返回全前景掩膜,
///   否则返回全背景掩膜. 不会产生 NaN.
pub fn binarize(labels: ArrayView3<f32>) -> Array3<u8> {
    let (min, max) = labels
        .iter()
        .filter(|p| p.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(*p as f64), hi.max(*p as f64))
        });

    // 全部为非有限值.
    if min > max {
        warn!("label volume has no finite sample, mask is empty");
        return Array3::from_elem(labels.raw_dim(), MASK_BACKGROUND);
    }

    let range = max - min;
    if range == 0.0 {
        let fill = if min > 0.0 {
            MASK_FOREGROUND
        } else {
            MASK_BACKGROUND
        };
        warn!("label volume is constant ({min}), mask is filled with {fill}");
        return labels.mapv(|p| if p.is_finite() { fill } else { MASK_BACKGROUND });
    }

    labels.mapv(|p| {
        if p.is_finite() && (p as f64 - min) / range > 0.5 {
            MASK_FOREGROUND
        } else {
            MASK_BACKGROUND
        }
    })
}

/// 二值掩膜. 体素值严格为 0 或 1, 与来源标签共享几何信息.
///
/// 该结构一经创建便不可修改.
#[derive(Debug, Clone)]
pub struct BinaryMask {
    geometry: Geometry,
    data: Array3<u8>,
}

impl BinaryMask {
    /// 由标签体数据二值化得到掩膜. 规则见 [`binarize`].
    pub fn from_label(label: &CtLabel) -> Self {
        Self {
            geometry: label.geometry(),
            data: binarize(label.data()),
        }
    }

    /// 掩膜的几何信息.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// 前景体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 掩膜是否不含任何前景体素?
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|p| is_foreground(*p))
    }
}
