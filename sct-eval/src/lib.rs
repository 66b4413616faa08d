#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 评估合成 CT (sCT) 相对于真值 CT (GT) 的体素级转换精度.
//!
//! 输入为三个已配准的 3D 体数据: 真值 CT, 合成 CT 和感兴趣区域标签.
//! 输出为两个标量 (MAE, ME, 单位 HU), 一份用于展示的差值体数据,
//! 以及一条 "HU 阈值 - Dice 系数" 的骨分割重叠曲线.
//!
//! # 注意
//!
//! 1. 该 crate 不负责配准和重采样. 三个体数据的几何信息 (形状, 原点,
//!   体素间距, 方向余弦) 必须一致, 否则评估直接返回
//!   [`EvalError::GeometryMismatch`].
//! 2. 该 crate 不负责可视化. 展示用差值图的掩膜外体素被置为空气 HU 值 (-1000),
//!   颜色表等展示层配置由调用者决定.
//!
//! # 模块划分
//!
//! ### 体数据与几何信息 ✅
//!
//! nifti 格式 CT 扫描 / 标签的加载与保存, 以及从 header 推导的空间几何信息.
//!
//! 实现位于 `sct-eval/src/data`.
//!
//! ### 掩膜二值化 ✅
//!
//! 最小-最大归一化后以 0.5 为界硬阈值化. 对标签取值范围不敏感
//! (`{0, 1}`, `{0, 255}` 等均可).
//!
//! 实现位于 `sct-eval/src/data/mask.rs`.
//!
//! ### 误差图与 MAE / ME ✅
//!
//! 实现位于 `sct-eval/src/eval/error_map.rs`.
//!
//! ### 多阈值骨分割 Dice 扫描 ✅
//!
//! 各阈值相互独立, 开启 `rayon` feature 时并行计算.
//!
//! 实现位于 `sct-eval/src/eval/overlap.rs`.
//!
//! ### 批量病例加载 ✅
//!
//! 实现位于 `sct-eval/src/dataset.rs`.
//!
//! # 退化情形约定
//!
//! 1. 常数标签: 值大于 0 视为全掩膜, 否则视为空掩膜.
//! 2. 空掩膜: MAE 与 ME 均为 NaN, 不 panic.
//! 3. 某阈值下两个骨分割均为空: 该阈值的 Dice 为 1.0, 扫描继续.

/// 三维索引, 按 `(z, h, w)` 排列.
pub type Idx3d = (usize, usize, usize);

/// 3D nii 体数据基础结构.
mod data;

pub use data::{BinaryMask, CtLabel, CtScan, Geometry, NiftiHeaderAttr};

pub use data::{geometry, mask};

pub mod consts;

pub mod dataset;

pub mod eval;

pub use eval::{evaluate, EvalConfig, EvalError, EvalReport, EvalResult};

pub mod prelude;
