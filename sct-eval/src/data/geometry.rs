//! 体数据的空间几何信息.

use ndarray::{ErrorKind, ShapeError};
use nifti::NiftiHeader;

use crate::eval::{EvalError, EvalResult};
use crate::Idx3d;

/// 几何信息比较时使用的相对容差. nifti header 以 `f32` 保存仿射参数,
/// 因此该值不宜过小.
pub const GEOMETRY_TOLERANCE: f64 = 1e-4;

/// 体数据的网格形状和空间元信息.
///
/// `shape` 按照 `(z, h, w)` 排列, 与体数据的访问方式一致.
/// `spacing`, `origin` 以及 `direction` 的列均按照 nifti 的 `(x, y, z)`
/// 排列, 即 `(w, h, z)` 方向. `direction[i][j]` 为第 `j` 个索引轴方向的单位向量的第
/// `i` 个物理分量.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    shape: Idx3d,
    spacing: [f64; 3],
    origin: [f64; 3],
    direction: [[f64; 3]; 3],
}

/// 单位方向矩阵.
const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// 将 (W, H, z) 转换成 (z, H, W).
#[inline]
pub(crate) fn shape_from_header(header: &NiftiHeader) -> Idx3d {
    let [_, w, h, z, ..] = header.dim;
    (z as usize, h as usize, w as usize)
}

impl Geometry {
    /// 由形状和空间元信息直接构建.
    ///
    /// `spacing` 的每个分量必须为正的有限值, 否则程序 panic.
    pub fn new(shape: Idx3d, spacing: [f64; 3], origin: [f64; 3], direction: [[f64; 3]; 3]) -> Self {
        assert!(
            spacing.iter().all(|s| s.is_finite() && *s > 0.0),
            "体素间距必须为正数"
        );
        Self {
            shape,
            spacing,
            origin,
            direction,
        }
    }

    /// 构建体素间距为 1 毫米, 原点为 0, 方向为单位阵的几何信息.
    #[inline]
    pub fn with_shape(shape: Idx3d) -> Self {
        Self::new(shape, [1.0; 3], [0.0; 3], IDENTITY)
    }

    /// 从 nifti header 推导几何信息.
    ///
    /// 优先使用 sform 仿射矩阵, 其次使用 qform 四元数, 都不可用时退化为
    /// `pixdim` 给出的体素间距, 零原点以及单位方向.
    pub fn from_header(header: &NiftiHeader) -> Self {
        let shape = shape_from_header(header);
        let pixdim = |i: usize| {
            let p = (header.pixdim[i] as f64).abs();
            if p.is_finite() && p > 0.0 {
                p
            } else {
                1.0
            }
        };

        if header.sform_code > 0 {
            let rows = [header.srow_x, header.srow_y, header.srow_z];
            let mut spacing = [1.0; 3];
            let mut direction = IDENTITY;
            for j in 0..3 {
                let norm = rows
                    .iter()
                    .map(|r| (r[j] as f64).powi(2))
                    .sum::<f64>()
                    .sqrt();
                if norm > 0.0 {
                    spacing[j] = norm;
                    for i in 0..3 {
                        direction[i][j] = rows[i][j] as f64 / norm;
                    }
                }
            }
            let origin = [rows[0][3] as f64, rows[1][3] as f64, rows[2][3] as f64];
            Self {
                shape,
                spacing,
                origin,
                direction,
            }
        } else if header.qform_code > 0 {
            let (b, c, d) = (
                header.quatern_b as f64,
                header.quatern_c as f64,
                header.quatern_d as f64,
            );
            let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
            let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
            let direction = [
                [
                    a * a + b * b - c * c - d * d,
                    2.0 * (b * c - a * d),
                    qfac * 2.0 * (b * d + a * c),
                ],
                [
                    2.0 * (b * c + a * d),
                    a * a + c * c - b * b - d * d,
                    qfac * 2.0 * (c * d - a * b),
                ],
                [
                    2.0 * (b * d - a * c),
                    2.0 * (c * d + a * b),
                    qfac * (a * a + d * d - b * b - c * c),
                ],
            ];
            Self {
                shape,
                spacing: [pixdim(1), pixdim(2), pixdim(3)],
                origin: [
                    header.quatern_x as f64,
                    header.quatern_y as f64,
                    header.quatern_z as f64,
                ],
                direction,
            }
        } else {
            Self {
                shape,
                spacing: [pixdim(1), pixdim(2), pixdim(3)],
                origin: [0.0; 3],
                direction: IDENTITY,
            }
        }
    }

    /// 生成一份描述该几何信息的 nifti header. 仿射信息以 sform 保存.
    ///
    /// nifti header 以 `u16` 保存各维长度, 任一维超出该范围时返回
    /// [`EvalError::Shape`].
    pub(crate) fn to_header(&self) -> EvalResult<NiftiHeader> {
        let dim = |n: usize| {
            u16::try_from(n)
                .map_err(|_| EvalError::Shape(ShapeError::from_kind(ErrorKind::Overflow)))
        };
        let mut header = NiftiHeader::default();
        let (z, h, w) = self.shape;
        header.dim = [3, dim(w)?, dim(h)?, dim(z)?, 1, 1, 1, 1];
        header.pixdim = [
            1.0,
            self.spacing[0] as f32,
            self.spacing[1] as f32,
            self.spacing[2] as f32,
            1.0,
            1.0,
            1.0,
            1.0,
        ];

        let row = |i: usize| {
            [
                (self.direction[i][0] * self.spacing[0]) as f32,
                (self.direction[i][1] * self.spacing[1]) as f32,
                (self.direction[i][2] * self.spacing[2]) as f32,
                self.origin[i] as f32,
            ]
        };
        header.sform_code = 1;
        header.qform_code = 0;
        (header.srow_x, header.srow_y, header.srow_z) = (row(0), row(1), row(2));
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        Ok(header)
    }

    /// 网格形状, 按照 `(z, h, w)` 排列.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.shape
    }

    /// 体素间距 (单位: 毫米), 按照 `(w, h, z)` 排列.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// 索引 `(0, 0, 0)` 处体素中心的物理坐标 (单位: 毫米).
    #[inline]
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// 方向余弦矩阵.
    #[inline]
    pub fn direction(&self) -> [[f64; 3]; 3] {
        self.direction
    }

    /// 体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (z, h, w) = self.shape;
        z * h * w
    }

    /// 单个体素的实际体积, 以立方毫米为单位.
    #[inline]
    pub fn voxel(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// 将 `(z, h, w)` 索引映射到物理坐标.
    pub fn index_to_physical(&self, (z, h, w): Idx3d) -> [f64; 3] {
        let steps = [
            w as f64 * self.spacing[0],
            h as f64 * self.spacing[1],
            z as f64 * self.spacing[2],
        ];
        let mut p = self.origin;
        for (i, pi) in p.iter_mut().enumerate() {
            *pi += (0..3).map(|j| self.direction[i][j] * steps[j]).sum::<f64>();
        }
        p
    }

    /// 与 `other` 逐项比较, 返回第一个不一致的属性名. 完全一致时返回 `None`.
    ///
    /// 浮点属性以 [`GEOMETRY_TOLERANCE`] 为相对容差.
    pub fn mismatch(&self, other: &Self) -> Option<&'static str> {
        #[inline]
        fn close(a: f64, b: f64) -> bool {
            (a - b).abs() <= GEOMETRY_TOLERANCE * a.abs().max(b.abs()).max(1.0)
        }

        if self.shape != other.shape {
            return Some("shape");
        }
        if !self.spacing.iter().zip(&other.spacing).all(|(a, b)| close(*a, *b)) {
            return Some("spacing");
        }
        if !self.origin.iter().zip(&other.origin).all(|(a, b)| close(*a, *b)) {
            return Some("origin");
        }
        let same_direction = self
            .direction
            .iter()
            .flatten()
            .zip(other.direction.iter().flatten())
            .all(|(a, b)| close(*a, *b));
        (!same_direction).then_some("direction")
    }

    /// 是否与 `other` 几何一致.
    #[inline]
    pub fn matches(&self, other: &Self) -> bool {
        self.mismatch(other).is_none()
    }
}
