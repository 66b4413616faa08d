//! 程序运行函数.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use log::{debug, error, info};
use sct_eval::dataset::{self, EvalCase};
use sct_eval::eval::{evaluate_with, OverlapPoint, SweepMonitor};
use sct_eval::{EvalConfig, EvalReport};

use crate::args::{Batch, Single};
use crate::config;
use crate::result;

/// 将扫描进度写入日志.
struct LogProgress;

impl SweepMonitor for LogProgress {
    fn on_point(&self, index: usize, total: usize, point: &OverlapPoint) {
        debug!(
            "[{}/{total}] {:.1} HU -> DSC {:.4}",
            index + 1,
            point.threshold,
            point.dice
        );
    }
}

/// 评估一个已加载的病例.
fn evaluate_case(case: &EvalCase, config: &EvalConfig) -> anyhow::Result<EvalReport> {
    Ok(evaluate_with(
        &case.gt,
        &case.sct,
        &case.label,
        config,
        &LogProgress,
    )?)
}

/// 按需保存展示用差值图和 Dice 曲线表.
fn save_outputs(
    report: &EvalReport,
    output: Option<&Path>,
    table: Option<&Path>,
) -> anyhow::Result<()> {
    if let Some(p) = output {
        report
            .difference()
            .save(p)
            .with_context(|| format!("failed to save difference map `{}`", p.display()))?;
        info!("difference map saved to `{}`", p.display());
    }
    if let Some(p) = table {
        result::write_table(report.overlap(), p)
            .with_context(|| format!("failed to save table `{}`", p.display()))?;
        info!("DSC table saved to `{}`", p.display());
    }
    Ok(())
}

/// 评估单个病例.
pub fn run_single(args: &Single, config: &EvalConfig) -> anyhow::Result<()> {
    let case = EvalCase::open(&args.gt, &args.sct, &args.mask).context("failed to load volumes")?;
    let report = evaluate_case(&case, config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let name = args.gt.display().to_string();
    result::describe_into(&name, &report, &mut out)?;
    out.flush()?;

    save_outputs(&report, args.output.as_deref(), args.table.as_deref())
}

/// 按编号批量评估. 单个病例失败不影响其余病例, 但最终返回错误.
pub fn run_batch(args: &Batch, config: &EvalConfig) -> anyhow::Result<()> {
    let base_dir = match &args.base_dir {
        Some(d) => d.clone(),
        None => config::base_dir_from_env_or_home()?,
    };
    anyhow::ensure!(
        base_dir.is_dir(),
        "`{}` is not a directory",
        base_dir.display()
    );
    if let Some(d) = &args.out_dir {
        fs::create_dir_all(d).with_context(|| format!("failed to create `{}`", d.display()))?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    result::sep_to(&mut out)?;

    let mut failed = 0usize;
    for (idx, case) in dataset::case_loader(args.ids.iter().copied(), &base_dir) {
        let report = case
            .map_err(anyhow::Error::from)
            .and_then(|c| evaluate_case(&c, config))
            .and_then(|report| {
                if let Some(d) = &args.out_dir {
                    let diff = d.join(format!("diff-{idx}.nii.gz"));
                    let table = d.join(format!("dsc-{idx}.csv"));
                    save_outputs(&report, Some(diff.as_path()), Some(table.as_path()))?;
                }
                Ok(report)
            });
        match report {
            Ok(report) => writeln!(out, "{}", result::summary_line(idx, &report))?,
            Err(e) => {
                failed += 1;
                error!("case {idx}: {e:#}");
            }
        }
    }
    result::sep_to(&mut out)?;
    out.flush()?;

    anyhow::ensure!(failed == 0, "{failed} of {} cases failed", args.ids.len());
    Ok(())
}
