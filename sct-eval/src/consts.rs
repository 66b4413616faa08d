//! 通用常量.

/// 掩膜取值.
pub mod gray {
    /// 二值掩膜中, 背景 (评估区域外) 的体素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 二值掩膜中, 前景 (评估区域内) 的体素值.
    pub const MASK_FOREGROUND: u8 = 1;

    /// 体素是否在评估区域内?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        matches!(p, MASK_FOREGROUND)
    }

    /// 体素是否在评估区域外?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, MASK_BACKGROUND)
    }
}

/// 空气的 HU 值. 用作掩膜外体素的填充值, 使其不会满足任何正阈值.
pub const AIR_HU: f32 = -1000.0;

/// 骨分割阈值化的 HU 上限. 假定高于任何实际骨组织的 HU 值.
pub const BONE_CEILING_HU: f32 = 1500.0;

/// 默认骨分割阈值的起点 (HU).
pub const DEFAULT_THRESHOLD_START_HU: f32 = 100.0;

/// 默认骨分割阈值的步长 (HU).
pub const DEFAULT_THRESHOLD_STEP_HU: f32 = 100.0;

/// 默认骨分割阈值的个数.
pub const DEFAULT_THRESHOLD_COUNT: usize = 10;

/// 默认骨分割阈值: 100, 200, ..., 1000 HU.
pub fn default_thresholds() -> Vec<f32> {
    (0..DEFAULT_THRESHOLD_COUNT)
        .map(|i| DEFAULT_THRESHOLD_START_HU + DEFAULT_THRESHOLD_STEP_HU * i as f32)
        .collect()
}

/// 两个骨分割结果均为空时的 Dice 系数.
pub const EMPTY_DICE: f64 = 1.0;
