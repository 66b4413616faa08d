//! `sct-report`: 合成 CT 评估的命令行结果输出端.
//!
//! 读取 nifti 格式的真值 CT, 合成 CT 和标签, 打印 MAE / ME 与 Dice 曲线,
//! 并可选地保存展示用差值图和 CSV 格式的曲线表.

mod args;
pub mod config;
pub mod result;
mod runner;

pub use args::Cli;
