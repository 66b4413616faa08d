//! 评估参数.

use super::{EvalError, EvalResult};
use crate::consts::{default_thresholds, AIR_HU, BONE_CEILING_HU};

/// 评估参数. [`Default`] 给出参考流程的取值.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EvalConfig {
    /// 骨分割阈值序列 (HU). 扫描结果按该顺序排列. 默认为 100, 200, ..., 1000.
    pub thresholds: Vec<f32>,

    /// 骨分割阈值化的 HU 上限 (包含). 默认为 1500.
    pub bone_ceiling_hu: f32,

    /// 掩膜外体素的填充值 (HU), 用于展示用差值图和骨分割. 默认为空气 (-1000).
    pub outside_hu: f32,

    /// 二值化前是否先将所有非零标签合并为同一前景. 默认开启.
    pub collapse_labels: bool,

    /// 是否并行计算. 仅在开启 `rayon` feature 时生效. 默认开启.
    pub parallel: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            thresholds: default_thresholds(),
            bone_ceiling_hu: BONE_CEILING_HU,
            outside_hu: AIR_HU,
            collapse_labels: true,
            parallel: true,
        }
    }
}

impl EvalConfig {
    /// 使用给定阈值序列, 其余参数取默认值.
    pub fn with_thresholds<I: IntoIterator<Item = f32>>(thresholds: I) -> Self {
        Self {
            thresholds: thresholds.into_iter().collect(),
            ..Self::default()
        }
    }

    /// 检查参数是否合法: 阈值, 上限和填充值都必须是有限值.
    pub fn validate(&self) -> EvalResult<()> {
        if let Some(t) = self.thresholds.iter().find(|t| !t.is_finite()) {
            return Err(EvalError::InvalidConfig(format!(
                "threshold {t} is not finite"
            )));
        }
        if !self.bone_ceiling_hu.is_finite() {
            return Err(EvalError::InvalidConfig(format!(
                "bone ceiling {} is not finite",
                self.bone_ceiling_hu
            )));
        }
        if !self.outside_hu.is_finite() {
            return Err(EvalError::InvalidConfig(format!(
                "outside value {} is not finite",
                self.outside_hu
            )));
        }
        Ok(())
    }
}
