//! 病例数据加载器.
//!
//! 提供迭代器风格的批量评估病例获取模式. 每个病例由同一目录下的三个 nifti
//! 文件组成: 真值 CT, 合成 CT 和评估区域标签.

use std::path::{Path, PathBuf};

use crate::eval::EvalResult;
use crate::{CtLabel, CtScan};

/// 文件名构造器. 接受病例索引数, 获得文件名.
pub type FilenameBuilder = fn(u32) -> String;

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 默认真值 CT 文件名: `ct-{idx}.nii.gz`.
pub fn default_gt_name(idx: u32) -> String {
    format!("ct-{idx}.nii.gz")
}

/// 默认合成 CT 文件名: `sct-{idx}.nii.gz`.
pub fn default_sct_name(idx: u32) -> String {
    format!("sct-{idx}.nii.gz")
}

/// 默认标签文件名: `mask-{idx}.nii.gz`.
pub fn default_mask_name(idx: u32) -> String {
    format!("mask-{idx}.nii.gz")
}

/// 一个待评估病例.
#[derive(Debug, Clone)]
pub struct EvalCase {
    /// 真值 CT.
    pub gt: CtScan,

    /// 合成 CT.
    pub sct: CtScan,

    /// 评估区域标签.
    pub label: CtLabel,
}

impl EvalCase {
    /// 分别打开三个 nii 文件. 任一文件打开失败则返回 `Err`.
    ///
    /// 该方法不检查三者的几何一致性, 由评估流程负责.
    pub fn open(
        gt_path: impl AsRef<Path>,
        sct_path: impl AsRef<Path>,
        mask_path: impl AsRef<Path>,
    ) -> EvalResult<Self> {
        Ok(Self {
            gt: CtScan::open(gt_path)?,
            sct: CtScan::open(sct_path)?,
            label: CtLabel::open(mask_path)?,
        })
    }
}

/// 从指定索引、路径创建使用默认文件名的病例加载器.
///
/// # 注意
///
/// 1. `path` 必须是目录, 否则程序 panic.
/// 2. `data` 的所有取值 `value` 必须在 `path` 下有 `ct-{value}.nii.gz`,
///   `sct-{value}.nii.gz` 和 `mask-{value}.nii.gz` 三个文件,
///   否则加载器在迭代时会返回 `Err`.
#[inline]
pub fn case_loader<I: IntoIterator<Item = u32>, P: AsRef<Path>>(data: I, path: P) -> CaseLoader {
    case_loader_with(
        data,
        path,
        [default_gt_name, default_sct_name, default_mask_name],
    )
}

/// 从指定索引、路径、文件名构造器来创建病例加载器.
///
/// `builders` 依次为真值 CT, 合成 CT 和标签的文件名构造器.
///
/// # 注意
///
/// `path` 必须是目录, 否则程序 panic.
pub fn case_loader_with<I: IntoIterator<Item = u32>, P: AsRef<Path>>(
    data: I,
    path: P,
    builders: [FilenameBuilder; 3],
) -> CaseLoader {
    let path = path.as_ref().to_owned();
    assert!(path.is_dir(), "{} 不是目录", path.display());

    let mut data: Vec<u32> = data.into_iter().collect();
    data.reverse();

    CaseLoader {
        path,
        data_rev: data,
        builders,
    }
}

/// 病例数据加载器, 并在内部自动转换文件名.
#[derive(Debug)]
pub struct CaseLoader {
    path: PathBuf,
    data_rev: Vec<u32>,
    builders: [FilenameBuilder; 3],
}

impl CaseLoader {
    /// 第 `idx` 个病例三个文件的全路径.
    pub fn paths(&self, idx: u32) -> [PathBuf; 3] {
        self.builders.map(|b| self.path.join(b(idx)))
    }
}

impl Iterator for CaseLoader {
    type Item = (u32, EvalResult<EvalCase>);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.data_rev.pop()?;
        let [gt, sct, mask] = self.paths(idx);
        Some((idx, EvalCase::open(gt, sct, mask)))
    }
}

impl ExactSizeIterator for CaseLoader {
    #[inline]
    fn len(&self) -> usize {
        self.data_rev.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(idx: u32) -> String {
        format!("case{idx:03}_gt.nii")
    }

    #[test]
    fn test_loader_paths_and_order() {
        let dir = std::env::temp_dir();
        let loader = case_loader_with(
            [3, 1, 2],
            &dir,
            [custom, default_sct_name, default_mask_name],
        );
        assert_eq!(loader.len(), 3);
        let [gt, sct, mask] = loader.paths(7);
        assert_eq!(gt, dir.join("case007_gt.nii"));
        assert_eq!(sct, dir.join("sct-7.nii.gz"));
        assert_eq!(mask, dir.join("mask-7.nii.gz"));

        // 文件不存在时逐项返回错误, 迭代顺序与输入一致.
        let ids: Vec<u32> = case_loader([900_001, 900_000], &dir)
            .map(|(idx, case)| {
                assert!(case.is_err());
                idx
            })
            .collect();
        assert_eq!(ids, vec![900_001, 900_000]);
    }
}
