use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::{Array3, ArrayView, ArrayViewMut, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::eval::{EvalError, EvalResult};
use crate::Idx3d;

pub mod geometry;
pub mod mask;

pub use geometry::Geometry;
pub use mask::BinaryMask;

use geometry::shape_from_header;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// nifti `datatype` 字段中 `float32` 的编码.
const DT_FLOAT32: i16 = 16;

/// 读取 nii 文件, 并将数据从 `[W, H, z]` 转换为 `[z, H, W]` 标准布局.
///
/// 体素值按 header 中的 `scl_slope` / `scl_inter` 换算后以 `f32` 保存.
fn read_volume(path: &Path) -> EvalResult<(BoxedHeader, Array3<f32>)> {
    let obj = ReaderOptions::new().read_file(path)?;
    let header = Box::new(obj.header().clone());

    // [W, H, z, (t, ...)] -> [(..., t), z, H, W].
    // hint: 原第一维向下增长, 原第二维向右增长.
    let data = obj.into_volume().into_ndarray::<f32>()?;
    let axes: Vec<usize> = (0..data.ndim()).rev().collect();
    let data = data.permuted_axes(axes.as_slice());
    let data = if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().into_owned()
    };

    // 尾部长度为 1 的维度 (如单帧的 t 维) 会在这里被吸收.
    let data = Array3::<f32>::from_shape_vec(shape_from_header(&header), data.into_raw_vec())?;
    Ok((header, data))
}

/// 由几何信息生成 `float32` 体数据所用的 header.
fn float_header(mut header: NiftiHeader) -> BoxedHeader {
    header.datatype = DT_FLOAT32;
    header.bitpix = 32;
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;
    Box::new(header)
}

/// 检查数据形状是否与几何信息一致.
fn check_shape(geometry: &Geometry, dim: Idx3d) -> EvalResult<()> {
    if geometry.shape() == dim {
        Ok(())
    } else {
        Err(EvalError::GeometryMismatch {
            left: "geometry",
            right: "data",
            attribute: "shape",
        })
    }
}

/// 3D nii 文件 header 的共用属性.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小, 按照 `(z, h, w)` 排列.
    #[inline]
    fn shape(&self) -> Idx3d {
        shape_from_header(self.header())
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 获取体数据的空间几何信息.
    #[inline]
    fn geometry(&self) -> Geometry {
        Geometry::from_header(self.header())
    }

    /// 获取单个体素分辨率, 以毫米为单位, 按照 `(z, h, w)` 排列.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [w, h, z] = self.geometry().spacing();
        [z, h, w]
    }
}

/// nii 格式 3D CT 扫描 (HU), 包括 header 和体数据. HU 值以 `f32` 保存.
///
/// 真值 CT, 合成 CT 以及展示用差值图都以该结构表示.
#[derive(Debug, Clone)]
pub struct CtScan {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl NiftiHeaderAttr for CtScan {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for CtScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for CtScan {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl CtScan {
    /// 打开 nii 文件格式的 3D CT 扫描. `path` 为 nii 文件的本地路径.
    pub fn open<P: AsRef<Path>>(path: P) -> EvalResult<Self> {
        let (header, data) = read_volume(path.as_ref())?;
        Ok(Self { header, data })
    }

    /// 根据 `(z, h, w)` 格式的裸 HU 数据和几何信息直接创建 `CtScan`.
    ///
    /// 若 `data` 形状与 `geometry` 不一致, 返回 [`EvalError::GeometryMismatch`].
    pub fn from_array(geometry: &Geometry, data: Array3<f32>) -> EvalResult<Self> {
        check_shape(geometry, data.dim())?;
        Ok(Self {
            header: float_header(geometry.to_header()?),
            data,
        })
    }

    /// 创建一个与 `self` 共享空间元信息的新扫描 (体素类型为 `float32`).
    ///
    /// `data` 形状必须与 `self` 一致.
    pub(crate) fn derive(&self, data: Array3<f32>) -> Self {
        debug_assert_eq!(data.dim(), self.data.dim());
        Self {
            header: float_header((*self.header).clone()),
            data,
        }
    }

    /// 以 nii 格式保存到 `path`. 以 `.gz` 结尾的路径会被压缩.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> EvalResult<()> {
        // [z, H, W] -> [W, H, z]
        let data = self.data.view().permuted_axes([2, 1, 0]);
        WriterOptions::new(path.as_ref())
            .reference_header(&self.header)
            .write_nifti(&data)?;
        Ok(())
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, f32, Ix3> {
        self.data.view_mut()
    }

    /// 取出底层数据.
    #[inline]
    pub fn into_data(self) -> Array3<f32> {
        self.data
    }
}

/// nii 格式 3D 标签 (感兴趣区域). 标签可以是任意非负数值, 以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct CtLabel {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl NiftiHeaderAttr for CtLabel {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for CtLabel {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl CtLabel {
    /// 打开 nii 文件格式的 3D 标签. `path` 为 nii 文件的本地路径.
    pub fn open<P: AsRef<Path>>(path: P) -> EvalResult<Self> {
        let (header, data) = read_volume(path.as_ref())?;
        Ok(Self { header, data })
    }

    /// 根据 `(z, h, w)` 格式的裸标签数据和几何信息直接创建 `CtLabel`.
    ///
    /// 若 `data` 形状与 `geometry` 不一致, 返回 [`EvalError::GeometryMismatch`].
    pub fn from_array(geometry: &Geometry, data: Array3<f32>) -> EvalResult<Self> {
        check_shape(geometry, data.dim())?;
        Ok(Self {
            header: float_header(geometry.to_header()?),
            data,
        })
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 获取非零 (且有限) 标签体素的个数.
    #[inline]
    pub fn count_nonzero(&self) -> usize {
        self.data
            .iter()
            .filter(|p| p.is_finite() && **p != 0.0)
            .count()
    }

    /// 将多值标签合并为单一前景: 非零有限值为 1, 其余为 0.
    ///
    /// 该操作不修改 `self`.
    pub fn collapsed(&self) -> Self {
        let data = self
            .data
            .mapv(|p| if p.is_finite() && p != 0.0 { 1.0 } else { 0.0 });
        Self {
            header: self.header.clone(),
            data,
        }
    }

    /// 二值化为 [`BinaryMask`]. 规则见 [`mask::binarize`].
    #[inline]
    pub fn binarize(&self) -> BinaryMask {
        BinaryMask::from_label(self)
    }
}
