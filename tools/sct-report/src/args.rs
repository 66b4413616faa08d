use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use crate::{config, runner};

#[derive(Parser, Debug)]
#[command(name = "sct-report")]
#[command(about = "评估合成 CT 相对真值 CT 的转换精度 (MAE, ME, 骨阈值 Dice 曲线).")]
#[command(version, long_about = None)]
pub struct Cli {
    /// 日志级别 (off, error, warn, info, debug, trace)。
    #[arg(long = "log-level", default_value = "info", value_parser = log_level, global = true)]
    pub log_level: LevelFilter,

    /// TOML 格式的评估参数文件。缺省时使用默认参数。
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// 骨分割阈值 (HU), 以逗号分隔。覆盖参数文件中的取值。
    #[arg(long, value_delimiter = ',', value_parser = finite_hu, global = true)]
    thresholds: Option<Vec<f32>>,

    /// 子命令。
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let config = config::load(self.config.as_deref(), self.thresholds)?;
        match self.command {
            Commands::Single(v) => runner::run_single(&v, &config),
            Commands::Batch(v) => runner::run_batch(&v, &config),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 评估单个病例。
    Single(Single),
    /// 按编号批量评估目录下的病例。
    Batch(Batch),
}

#[derive(Args, Debug)]
pub struct Single {
    /// 真值 CT 文件。
    #[arg(long)]
    pub gt: PathBuf,

    /// 合成 CT 文件。
    #[arg(long)]
    pub sct: PathBuf,

    /// 评估区域标签文件。
    #[arg(long)]
    pub mask: PathBuf,

    /// 展示用差值图的保存路径。
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Dice 曲线 CSV 表的保存路径。
    #[arg(long)]
    pub table: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct Batch {
    /// 病例目录。缺省时依次尝试 `$SCT_EVAL_DIR` 和 `$HOME/dataset/sct`。
    #[arg(long = "base-dir", short = 'D')]
    pub base_dir: Option<PathBuf>,

    /// 病例编号, 以逗号分隔。
    #[arg(long, value_delimiter = ',', required = true)]
    pub ids: Vec<u32>,

    /// 每个病例的差值图和 Dice 曲线表的输出目录。
    #[arg(long = "out-dir")]
    pub out_dir: Option<PathBuf>,
}

fn log_level(s: &str) -> Result<LevelFilter, String> {
    s.parse()
        .map_err(|_| format!("`{s}` is not a legal log level"))
}

fn finite_hu(s: &str) -> Result<f32, String> {
    let hu: f32 = s
        .trim()
        .parse()
        .map_err(|_| format!("`{s}` is not a legal HU value"))?;
    if !hu.is_finite() {
        return Err(format!("`{s}` is not a finite HU value"));
    }
    Ok(hu)
}
