//! 评估参数与数据路径的获取.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use sct_eval::EvalConfig;

/// 加载评估参数.
///
/// 1. 若给定 `path`, 则从该 TOML 文件读取, 缺失的字段取默认值;
/// 2. 否则, 使用默认参数;
/// 3. 若给定 `thresholds`, 则覆盖上述结果中的阈值序列.
pub fn load(path: Option<&Path>, thresholds: Option<Vec<f32>>) -> anyhow::Result<EvalConfig> {
    let mut config = match path {
        Some(p) => {
            let text = fs::read_to_string(p)
                .with_context(|| format!("failed to read config `{}`", p.display()))?;
            parse(&text).with_context(|| format!("failed to parse config `{}`", p.display()))?
        }
        None => EvalConfig::default(),
    };
    if let Some(t) = thresholds {
        config.thresholds = t;
    }
    config.validate()?;
    Ok(config)
}

/// 从 TOML 文本解析评估参数.
pub fn parse(text: &str) -> anyhow::Result<EvalConfig> {
    Ok(toml::from_str(text)?)
}

/// 获取批量评估的病例目录.
///
/// 1. 若环境变量 `$SCT_EVAL_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/sct`.
pub fn base_dir_from_env_or_home() -> anyhow::Result<PathBuf> {
    match env::var("SCT_EVAL_DIR") {
        Ok(d) if !d.is_empty() => Ok(PathBuf::from(d)),
        _ => sct_eval::dataset::home_dataset_dir_with(["sct"])
            .ok_or_else(|| anyhow!("cannot locate home directory, pass `--base-dir`")),
    }
}
