//! 评估结果输出.

use std::io::{self, Write};
use std::path::Path;

use sct_eval::eval::OverlapSeries;
use sct_eval::EvalReport;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep_to<W: Write>(mut w: W) -> io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

#[inline]
fn hu_to_display(f: f64) -> String {
    if f.is_nan() {
        "/".to_string()
    } else {
        format!("{f:.1}")
    }
}

/// 将 `report` 的结果写进 `w` 中.
pub fn describe_into<W: Write>(name: &str, report: &EvalReport, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "Case `{name}`:")?;
    writeln!(w, "{S4}Mask voxels: {}", report.mask_voxels())?;
    writeln!(
        w,
        "{S4}Mean Absolute Error (MAE) [HU] = {}",
        hu_to_display(report.mae())
    )?;
    writeln!(w, "{S4}Mean Error (ME) [HU] = {}", hu_to_display(report.me()))?;
    writeln!(w, "{S4}Bone threshold assessment:")?;
    writeln!(w, "{S4}{S4}{:>8}  {:>6}", "HU", "DSC")?;
    for p in report.overlap().iter() {
        writeln!(w, "{S4}{S4}{:>8.1}  {:>6.4}", p.threshold, p.dice)?;
    }
    Ok(())
}

/// 批量评估时每个病例的一行摘要.
pub fn summary_line(idx: u32, report: &EvalReport) -> String {
    let mean_dice = if report.overlap().is_empty() {
        f64::NAN
    } else {
        report.overlap().iter().map(|p| p.dice).sum::<f64>() / report.overlap().len() as f64
    };
    format!(
        "case {idx:>4}: MAE = {:>7} HU, ME = {:>7} HU, mean DSC = {:.4}",
        hu_to_display(report.mae()),
        hu_to_display(report.me()),
        mean_dice
    )
}

/// 将 Dice 曲线写入 `w`, 表头为 `HU,DSC`.
pub fn write_table_to<W: Write>(series: &OverlapSeries, w: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(w);
    for p in series.iter() {
        writer.serialize(p)?;
    }
    writer.flush()?;
    Ok(())
}

/// 将 Dice 曲线保存为 CSV 文件.
pub fn write_table<P: AsRef<Path>>(series: &OverlapSeries, path: P) -> anyhow::Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_table_to(series, io::BufWriter::new(file))
}
