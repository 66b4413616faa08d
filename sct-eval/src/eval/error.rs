//! 运行时错误.

use thiserror::Error;

/// 评估流程的运行时错误.
#[derive(Debug, Error)]
pub enum EvalError {
    /// 两个体数据的网格形状或空间元信息不一致.
    ///
    /// `left` 和 `right` 为参与比较的两个体数据的角色名, `attribute`
    /// 为第一个不一致的属性名 (`shape`, `spacing`, `origin` 或 `direction`).
    #[error("geometry mismatch between {left} and {right}: {attribute} differs")]
    GeometryMismatch {
        /// 第一个体数据的角色.
        left: &'static str,

        /// 第二个体数据的角色.
        right: &'static str,

        /// 不一致的属性.
        attribute: &'static str,
    },

    /// 评估参数不合法.
    #[error("invalid evaluation config: {0}")]
    InvalidConfig(String),

    /// 阈值扫描被调用者取消. 参数为取消前已完成的阈值个数.
    #[error("overlap sweep cancelled after {0} thresholds")]
    Cancelled(usize),

    /// nifti 文件读写错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// 体数据形状与元信息不符.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}
