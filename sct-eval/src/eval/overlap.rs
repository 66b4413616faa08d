//! 多阈值骨分割 Dice 扫描.
//!
//! 对每个 HU 阈值 `t`, 真值 CT 和合成 CT 分别在掩膜内阈值化
//! (`t <= HU <= 上限` 为骨), 然后计算两者的 Dice 系数.

use log::debug;
use ndarray::{Array3, ArrayView3, Zip};

use super::{check_geometry, ensure_dim, EvalConfig, EvalError, EvalResult};
use crate::consts::gray::{is_foreground, MASK_BACKGROUND, MASK_FOREGROUND};
use crate::consts::{AIR_HU, BONE_CEILING_HU, EMPTY_DICE};
use crate::{BinaryMask, CtScan};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
    }
}

/// 曲线上的一个点.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverlapPoint {
    /// 骨分割阈值 (HU).
    #[cfg_attr(feature = "serde", serde(rename = "HU"))]
    pub threshold: f32,

    /// 该阈值下的 Dice 系数, 取值 `[0, 1]`.
    #[cfg_attr(feature = "serde", serde(rename = "DSC"))]
    pub dice: f64,
}

/// "阈值 - Dice" 曲线. 点的顺序与输入阈值序列一致.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlapSeries {
    points: Vec<OverlapPoint>,
}

impl OverlapSeries {
    /// 点的个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 曲线是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 按顺序迭代所有点.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &OverlapPoint> {
        self.points.iter()
    }

    /// 所有点的切片.
    #[inline]
    pub fn points(&self) -> &[OverlapPoint] {
        &self.points
    }

    /// 按阈值查找 Dice 系数.
    pub fn dice_at(&self, threshold: f32) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.threshold == threshold)
            .map(|p| p.dice)
    }
}

impl FromIterator<OverlapPoint> for OverlapSeries {
    fn from_iter<I: IntoIterator<Item = OverlapPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for OverlapSeries {
    type Item = OverlapPoint;
    type IntoIter = std::vec::IntoIter<OverlapPoint>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

/// 扫描过程的观察者. 在阈值之间被轮询, 可用于汇报进度或协作式取消.
///
/// 开启并行时, 回调可能在不同线程中以任意顺序被调用.
pub trait SweepMonitor: Sync {
    /// 某个阈值计算完毕. `index` 为该阈值在输入序列中的位置.
    fn on_point(&self, _index: usize, _total: usize, _point: &OverlapPoint) {}

    /// 返回 `true` 时, 尚未开始的阈值不再计算, 扫描返回 [`EvalError::Cancelled`].
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// 不做任何事的观察者.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMonitor;

impl SweepMonitor for NoMonitor {}

/// 将 `volume` 在掩膜内按 `[lower, upper]` 阈值化. 掩膜外体素先被置为 `outside`.
///
/// 两者形状不一致时返回 [`EvalError::GeometryMismatch`].
pub fn bone_segmentation(
    volume: ArrayView3<f32>,
    mask: ArrayView3<u8>,
    lower: f32,
    upper: f32,
    outside: f32,
) -> EvalResult<Array3<u8>> {
    ensure_dim(volume.dim(), mask.dim(), "volume", "mask")?;
    Ok(Zip::from(volume).and(mask).map_collect(|v, m| {
        let v = if is_foreground(*m) { *v } else { outside };
        if lower <= v && v <= upper {
            MASK_FOREGROUND
        } else {
            MASK_BACKGROUND
        }
    }))
}

/// 由交集和两个集合的大小计算 Dice 系数. 两者均为空时为 [`EMPTY_DICE`].
#[inline]
fn dice_from_counts(both: usize, a: usize, b: usize) -> f64 {
    if a + b == 0 {
        EMPTY_DICE
    } else {
        2.0 * both as f64 / (a + b) as f64
    }
}

/// 两个二值体数据的 Dice 系数 `2|A∩B| / (|A| + |B|)`.
///
/// 两者均不含前景时返回 [`EMPTY_DICE`]. 形状不一致时返回
/// [`EvalError::GeometryMismatch`].
pub fn dice(a: ArrayView3<u8>, b: ArrayView3<u8>) -> EvalResult<f64> {
    ensure_dim(a.dim(), b.dim(), "left segmentation", "right segmentation")?;
    let (both, na, nb) = Zip::from(a)
        .and(b)
        .fold((0usize, 0usize, 0usize), |(both, na, nb), pa, pb| {
            let (fa, fb) = (is_foreground(*pa), is_foreground(*pb));
            (
                both + (fa && fb) as usize,
                na + fa as usize,
                nb + fb as usize,
            )
        });
    Ok(dice_from_counts(both, na, nb))
}

/// 一次骨阈值扫描. 只读地借用输入体数据.
#[derive(Debug, Clone)]
pub struct OverlapSweep<'a> {
    gt: ArrayView3<'a, f32>,
    sct: ArrayView3<'a, f32>,
    mask: ArrayView3<'a, u8>,
    ceiling: f32,
    outside: f32,
    parallel: bool,
}

impl<'a> OverlapSweep<'a> {
    /// 以默认上限 (1500 HU) 和填充值 (-1000 HU) 创建扫描.
    ///
    /// 三者几何不一致时返回 [`EvalError::GeometryMismatch`].
    pub fn new(gt: &'a CtScan, sct: &'a CtScan, mask: &'a BinaryMask) -> EvalResult<Self> {
        check_geometry(gt, sct, mask)?;
        Ok(Self {
            gt: gt.data(),
            sct: sct.data(),
            mask: mask.data(),
            ceiling: BONE_CEILING_HU,
            outside: AIR_HU,
            parallel: true,
        })
    }

    /// 按 `config` 中的上限, 填充值和并行开关创建扫描.
    pub fn from_config(
        gt: &'a CtScan,
        sct: &'a CtScan,
        mask: &'a BinaryMask,
        config: &EvalConfig,
    ) -> EvalResult<Self> {
        Ok(Self::new(gt, sct, mask)?
            .ceiling(config.bone_ceiling_hu)
            .outside(config.outside_hu)
            .parallel(config.parallel))
    }

    /// 设置阈值化的 HU 上限 (包含).
    #[inline]
    pub fn ceiling(mut self, hu: f32) -> Self {
        self.ceiling = hu;
        self
    }

    /// 设置掩膜外体素的填充值.
    #[inline]
    pub fn outside(mut self, hu: f32) -> Self {
        self.outside = hu;
        self
    }

    /// 设置是否并行. 未开启 `rayon` feature 时无效.
    #[inline]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// 计算单个阈值下的 Dice 系数.
    ///
    /// 与先调用 [`bone_segmentation`] 再调用 [`dice`] 的结果一致, 但不分配中间体数据.
    pub fn dice_at(&self, threshold: f32) -> f64 {
        let (lo, hi, outside) = (threshold, self.ceiling, self.outside);
        let is_bone = |v: f32, m: u8| {
            let v = if is_foreground(m) { v } else { outside };
            lo <= v && v <= hi
        };

        let (both, na, nb) = Zip::from(self.gt)
            .and(self.sct)
            .and(self.mask)
            .fold((0usize, 0usize, 0usize), |(both, na, nb), g, s, m| {
                let (fa, fb) = (is_bone(*g, *m), is_bone(*s, *m));
                (
                    both + (fa && fb) as usize,
                    na + fa as usize,
                    nb + fb as usize,
                )
            });
        dice_from_counts(both, na, nb)
    }

    /// 对 `thresholds` 中的每个阈值依次计算 Dice 系数.
    #[inline]
    pub fn run(&self, thresholds: &[f32]) -> EvalResult<OverlapSeries> {
        self.run_with(thresholds, &NoMonitor)
    }

    /// 与 [`Self::run`] 相同, 但在阈值之间轮询 `monitor`.
    pub fn run_with<M: SweepMonitor + ?Sized>(
        &self,
        thresholds: &[f32],
        monitor: &M,
    ) -> EvalResult<OverlapSeries> {
        #[cfg(feature = "rayon")]
        {
            if self.parallel && thresholds.len() > 1 {
                return self.par_run_with(thresholds, monitor);
            }
        }

        let total = thresholds.len();
        let mut points = Vec::with_capacity(total);
        for (i, &threshold) in thresholds.iter().enumerate() {
            if monitor.is_cancelled() {
                return Err(EvalError::Cancelled(i));
            }
            let point = self.point(threshold);
            monitor.on_point(i, total, &point);
            points.push(point);
        }
        Ok(OverlapSeries { points })
    }

    /// 计算并记录一个点.
    fn point(&self, threshold: f32) -> OverlapPoint {
        let dice = self.dice_at(threshold);
        debug!("threshold {threshold} HU: dice = {dice:.4}");
        OverlapPoint { threshold, dice }
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl<'a> OverlapSweep<'a> {
    /// 借助 `rayon`, 并行地计算各阈值. 结果顺序与 `thresholds` 一致.
    fn par_run_with<M: SweepMonitor + ?Sized>(
        &self,
        thresholds: &[f32],
        monitor: &M,
    ) -> EvalResult<OverlapSeries> {
        let total = thresholds.len();
        let done = AtomicUsize::new(0);
        let points: Vec<Option<OverlapPoint>> = thresholds
            .par_iter()
            .enumerate()
            .map(|(i, &threshold)| {
                if monitor.is_cancelled() {
                    return None;
                }
                let point = self.point(threshold);
                done.fetch_add(1, Ordering::Release);
                monitor.on_point(i, total, &point);
                Some(point)
            })
            .collect();

        if points.iter().any(Option::is_none) {
            return Err(EvalError::Cancelled(done.load(Ordering::Acquire)));
        }
        Ok(points.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CtLabel, Geometry};
    use approx::assert_relative_eq;
    use ndarray::Array3;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    const SHAPE: (usize, usize, usize) = (3, 4, 5);

    fn scan_from(data: Array3<f32>) -> CtScan {
        CtScan::from_array(&Geometry::with_shape(SHAPE), data).unwrap()
    }

    fn mask_from(data: Array3<f32>) -> BinaryMask {
        CtLabel::from_array(&Geometry::with_shape(SHAPE), data)
            .unwrap()
            .binarize()
    }

    /// 按体素线性索引生成一个 -200 .. 1800 HU 的斜坡.
    fn ramp(offset: f32) -> CtScan {
        let n = SHAPE.0 * SHAPE.1 * SHAPE.2;
        let v = (0..n).map(|i| -200.0 + 2000.0 * i as f32 / n as f32 + offset).collect();
        scan_from(Array3::from_shape_vec(SHAPE, v).unwrap())
    }

    fn half_mask() -> BinaryMask {
        let n = SHAPE.0 * SHAPE.1 * SHAPE.2;
        let v = (0..n).map(|i| (i % 2) as f32).collect();
        mask_from(Array3::from_shape_vec(SHAPE, v).unwrap())
    }

    #[test]
    fn test_dice_basic() {
        let a = Array3::from_shape_vec((1, 1, 4), vec![1u8, 1, 0, 0]).unwrap();
        let b = Array3::from_shape_vec((1, 1, 4), vec![1u8, 0, 1, 0]).unwrap();
        assert_relative_eq!(dice(a.view(), b.view()).unwrap(), 0.5);
        assert_relative_eq!(dice(a.view(), a.view()).unwrap(), 1.0);

        let empty = Array3::<u8>::zeros((1, 1, 4));
        assert_eq!(dice(empty.view(), empty.view()).unwrap(), EMPTY_DICE);
        assert_eq!(dice(a.view(), empty.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_dice_rejects_shape_mismatch() {
        // 不同形状不能被截断或广播后再比较.
        let a = Array3::from_elem((1, 1, 4), 1u8);
        let b = Array3::from_elem((1, 1, 2), 1u8);
        let err = dice(a.view(), b.view()).unwrap_err();
        assert!(matches!(
            err,
            EvalError::GeometryMismatch {
                attribute: "shape",
                ..
            }
        ));

        let v = Array3::<f32>::zeros((1, 2, 2));
        let m = Array3::<u8>::ones((1, 1, 2));
        assert!(bone_segmentation(v.view(), m.view(), 100.0, 1500.0, -1000.0).is_err());
    }

    #[test]
    fn test_bone_segmentation_bounds() {
        let v = Array3::from_shape_vec((1, 1, 5), vec![99.0, 100.0, 1500.0, 1500.5, 700.0]).unwrap();
        let m = Array3::from_shape_vec((1, 1, 5), vec![1u8, 1, 1, 1, 0]).unwrap();
        let seg = bone_segmentation(v.view(), m.view(), 100.0, 1500.0, -1000.0).unwrap();
        assert_eq!(seg.iter().copied().collect::<Vec<_>>(), vec![0, 1, 1, 0, 0]);
    }

    #[test]
    fn test_fused_dice_matches_explicit() {
        let (gt, sct, mask) = (ramp(0.0), ramp(35.0), half_mask());
        let sweep = OverlapSweep::new(&gt, &sct, &mask).unwrap();
        for t in [-500.0, 0.0, 100.0, 450.0, 1000.0, 1490.0, 1600.0] {
            let a = bone_segmentation(gt.data(), mask.data(), t, 1500.0, -1000.0).unwrap();
            let b = bone_segmentation(sct.data(), mask.data(), t, 1500.0, -1000.0).unwrap();
            assert_relative_eq!(sweep.dice_at(t), dice(a.view(), b.view()).unwrap());
        }
    }

    #[test]
    fn test_dice_symmetric() {
        let (gt, sct, mask) = (ramp(0.0), ramp(-120.0), half_mask());
        let forward = OverlapSweep::new(&gt, &sct, &mask)
            .unwrap()
            .run(&crate::consts::default_thresholds())
            .unwrap();
        let backward = OverlapSweep::new(&sct, &gt, &mask)
            .unwrap()
            .run(&crate::consts::default_thresholds())
            .unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_identical_volumes_give_one() {
        let gt = ramp(0.0);
        let mask = half_mask();
        let series = OverlapSweep::new(&gt, &gt, &mask)
            .unwrap()
            .run(&[100.0, 900.0, 1400.0, 2000.0])
            .unwrap();
        assert!(series.iter().all(|p| p.dice == 1.0));
    }

    #[test]
    fn test_outside_mask_is_ignored() {
        // 掩膜外的体素差异很大, 但不影响 Dice.
        let n = SHAPE.0 * SHAPE.1 * SHAPE.2;
        let mask = half_mask();
        let gt = scan_from(Array3::from_elem(SHAPE, 600.0));
        let sct_v = (0..n)
            .map(|i| if i % 2 == 1 { 600.0 } else { 1200.0 })
            .collect();
        let sct = scan_from(Array3::from_shape_vec(SHAPE, sct_v).unwrap());
        let series = OverlapSweep::new(&gt, &sct, &mask)
            .unwrap()
            .run(&[100.0, 1000.0])
            .unwrap();
        assert_eq!(series.dice_at(100.0), Some(1.0));
        assert_eq!(series.dice_at(1000.0), Some(EMPTY_DICE));
    }

    #[test]
    fn test_series_order_and_length() {
        let (gt, sct, mask) = (ramp(0.0), ramp(80.0), half_mask());
        let thresholds = [700.0, 100.0, 1300.0, 100.0, 400.0];
        for parallel in [false, true] {
            let series = OverlapSweep::new(&gt, &sct, &mask)
                .unwrap()
                .parallel(parallel)
                .run(&thresholds)
                .unwrap();
            assert_eq!(series.len(), thresholds.len());
            let got: Vec<f32> = series.iter().map(|p| p.threshold).collect();
            assert_eq!(got, thresholds);
            assert!(series.iter().all(|p| (0.0..=1.0).contains(&p.dice)));
        }
    }

    #[test]
    fn test_constant_scenario() {
        let gt = scan_from(Array3::from_elem(SHAPE, 500.0));
        let mask = mask_from(Array3::ones(SHAPE));
        let series = OverlapSweep::new(&gt, &gt.clone(), &mask)
            .unwrap()
            .run(&crate::consts::default_thresholds())
            .unwrap();
        assert_eq!(series.len(), 10);
        for p in series.iter() {
            // t <= 500: 两者均为全骨; t > 500: 两者均为空, 取约定值.
            let expected = if p.threshold <= 500.0 { 1.0 } else { EMPTY_DICE };
            assert_eq!(p.dice, expected);
        }
    }

    #[test]
    fn test_empty_thresholds() {
        let (gt, mask) = (ramp(0.0), half_mask());
        let series = OverlapSweep::new(&gt, &gt, &mask).unwrap().run(&[]).unwrap();
        assert!(series.is_empty());
    }

    struct Recorder {
        seen: Mutex<Vec<usize>>,
    }

    impl SweepMonitor for Recorder {
        fn on_point(&self, index: usize, total: usize, _point: &OverlapPoint) {
            assert_eq!(total, 4);
            self.seen.lock().unwrap().push(index);
        }
    }

    #[test]
    fn test_monitor_progress() {
        let (gt, sct, mask) = (ramp(0.0), ramp(10.0), half_mask());
        let rec = Recorder {
            seen: Mutex::new(vec![]),
        };
        OverlapSweep::new(&gt, &sct, &mask)
            .unwrap()
            .run_with(&[100.0, 200.0, 300.0, 400.0], &rec)
            .unwrap();
        let mut seen = rec.seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    struct CancelAfterFirst {
        fired: AtomicBool,
    }

    impl SweepMonitor for CancelAfterFirst {
        fn on_point(&self, _index: usize, _total: usize, _point: &OverlapPoint) {
            self.fired.store(true, Ordering::Release);
        }

        fn is_cancelled(&self) -> bool {
            self.fired.load(Ordering::Acquire)
        }
    }

    #[test]
    fn test_monitor_cancel() {
        let (gt, sct, mask) = (ramp(0.0), ramp(10.0), half_mask());
        let monitor = CancelAfterFirst {
            fired: AtomicBool::new(false),
        };
        let err = OverlapSweep::new(&gt, &sct, &mask)
            .unwrap()
            .parallel(false)
            .run_with(&[100.0, 200.0, 300.0], &monitor)
            .unwrap_err();
        assert!(matches!(err, EvalError::Cancelled(1)));
    }
}
