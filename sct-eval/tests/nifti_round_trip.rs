use std::path::PathBuf;

use ndarray::Array3;
use sct_eval::dataset;
use sct_eval::prelude::*;

const SHAPE: Idx3d = (3, 4, 5);

fn init_logger() {
    // 多个测试共用同一个全局 logger, 重复初始化的错误可以忽略.
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

fn work_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sct-eval-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn geometry() -> Geometry {
    Geometry::new(
        SHAPE,
        [0.75, 0.75, 2.5],
        [-90.0, 110.5, -40.0],
        [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]],
    )
}

fn ramp(offset: f32) -> Array3<f32> {
    let n = SHAPE.0 * SHAPE.1 * SHAPE.2;
    let v = (0..n).map(|i| i as f32 * 25.0 - 100.0 + offset).collect();
    Array3::from_shape_vec(SHAPE, v).unwrap()
}

#[test]
fn scan_survives_save_and_open() {
    init_logger();
    let dir = work_dir("scan");
    let path = dir.join("ct-0.nii.gz");
    let scan = CtScan::from_array(&geometry(), ramp(0.0)).unwrap();
    scan.save(&path).unwrap();

    let back = CtScan::open(&path).unwrap();
    assert_eq!(back.shape(), SHAPE);
    assert!(back.geometry().matches(&geometry()));
    assert_eq!(back.data(), scan.data());
    assert_eq!(back[(2, 1, 4)], scan[(2, 1, 4)]);

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn evaluate_cases_from_disk() {
    init_logger();
    let dir = work_dir("cases");
    let g = geometry();
    CtScan::from_array(&g, ramp(0.0))
        .unwrap()
        .save(dir.join(dataset::default_gt_name(1)))
        .unwrap();
    CtScan::from_array(&g, ramp(-40.0))
        .unwrap()
        .save(dir.join(dataset::default_sct_name(1)))
        .unwrap();
    // 标签以 {0, 255} 编码, 仅第一层切片之外为前景.
    let mut label = Array3::from_elem(SHAPE, 255.0f32);
    label.index_axis_mut(ndarray::Axis(0), 0).fill(0.0);
    CtScan::from_array(&g, label)
        .unwrap()
        .save(dir.join(dataset::default_mask_name(1)))
        .unwrap();

    let mut loader = case_loader([1], &dir);
    let (idx, case) = loader.next().unwrap();
    assert_eq!(idx, 1);
    assert!(loader.next().is_none());
    let case = case.unwrap();

    let report = evaluate(&case.gt, &case.sct, &case.label, &EvalConfig::default()).unwrap();
    assert_eq!(report.mask_voxels(), 2 * 4 * 5);
    assert!((report.me() - 40.0).abs() < 1e-4);
    assert!((report.mae() - 40.0).abs() < 1e-4);
    assert_eq!(report.overlap().len(), 10);

    // 展示用差值图保存后仍然保留真值 CT 的几何信息.
    let out = dir.join("diff.nii.gz");
    report.difference().save(&out).unwrap();
    let diff = CtScan::open(&out).unwrap();
    assert!(diff.geometry().matches(&case.gt.geometry()));
    assert_eq!(diff[(0, 0, 0)], AIR_HU);
    assert!((diff[(1, 0, 0)] - 40.0).abs() < 1e-4);

    std::fs::remove_dir_all(dir).unwrap();
}
