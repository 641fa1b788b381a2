//! RPU file inspection command.

use anyhow::Context;
use clap::Args;
use console::style;
use mapnlq_dolby::{parse_rpu_file, validate, DoviRpu, RpuNlqData};
use serde::Serialize;
use std::path::PathBuf;

/// Per-frame RPU summary.
#[derive(Debug, Clone, Serialize)]
pub struct RpuSummary {
    /// Frame index.
    pub frame: usize,
    /// Guessed Dolby Vision profile.
    pub profile: u8,
    /// rpu_format field.
    pub rpu_format: u16,
    /// BL bit depth.
    pub bl_bit_depth: u64,
    /// EL bit depth.
    pub el_bit_depth: u64,
    /// VDR bit depth.
    pub vdr_bit_depth: u64,
    /// Fixed-point coefficient precision.
    pub coefficient_log2_denom: u64,
    /// Whether the residual is applied.
    pub residual: bool,
    /// The RPU reuses the previous mapping.
    pub reuses_previous: bool,
    /// NLQ pivot count.
    pub nlq_pivots: u64,
    /// NLQ parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nlq: Option<RpuNlqData>,
    /// Why the RPU cannot drive reconstruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpuSummary {
    fn new(frame: usize, rpu: &DoviRpu) -> Self {
        let header = &rpu.header;
        Self {
            frame,
            profile: header.guessed_profile,
            rpu_format: header.rpu_format,
            bl_bit_depth: header.bl_bit_depth(),
            el_bit_depth: header.el_bit_depth(),
            vdr_bit_depth: header.vdr_bit_depth(),
            coefficient_log2_denom: header.coefficient_log2_denom,
            residual: !header.disable_residual_flag,
            reuses_previous: header.use_prev_vdr_rpu_flag,
            nlq_pivots: rpu.nlq_pivot_count(),
            nlq: rpu.data_mapping().and_then(|m| m.nlq.clone()),
            error: validate(rpu).err().map(|e| e.to_string()),
        }
    }
}

/// RPU file report.
#[derive(Debug, Clone, Serialize)]
pub struct RpuFileInfo {
    /// File path.
    pub file: String,
    /// Number of RPUs in the file.
    pub count: usize,
    /// RPUs that can drive NLQ reconstruction.
    pub usable: usize,
    /// Summaries of the listed frames.
    pub frames: Vec<RpuSummary>,
}

/// Display RPU file information.
#[derive(Args, Debug)]
pub struct CmdInfo {
    /// RPU file to inspect.
    pub file: PathBuf,

    /// Output in JSON format.
    #[arg(long)]
    pub json: bool,

    /// Number of frames to list.
    #[arg(long, default_value_t = 10)]
    pub frames: usize,
}

impl CmdInfo {
    /// Execute the info command.
    pub fn run(&self) -> anyhow::Result<()> {
        let rpus = parse_rpu_file(&self.file)
            .with_context(|| format!("cannot inspect {}", self.file.display()))?;

        let summaries: Vec<RpuSummary> = rpus
            .iter()
            .enumerate()
            .map(|(n, rpu)| RpuSummary::new(n, rpu))
            .collect();
        let usable = summaries.iter().filter(|s| s.error.is_none()).count();

        let info = RpuFileInfo {
            file: self.file.display().to_string(),
            count: rpus.len(),
            usable,
            frames: summaries.into_iter().take(self.frames).collect(),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            print_info(&info);
        }
        Ok(())
    }
}

fn print_info(info: &RpuFileInfo) {
    println!("{}", style("RPU File Information").cyan().bold());
    println!("{}", style("=".repeat(50)).dim());
    println!();

    println!("  {} {}", style("File:").bold(), info.file);
    println!("  {} {}", style("RPUs:").bold(), info.count);
    let usable = format!("{}/{}", info.usable, info.count);
    if info.usable == info.count {
        println!("  {} {}", style("Usable:").bold(), style(usable).green());
    } else {
        println!("  {} {}", style("Usable:").bold(), style(usable).yellow());
    }

    for summary in &info.frames {
        println!();
        println!(
            "  {} {}",
            style("Frame").cyan().bold(),
            style(summary.frame).cyan().bold()
        );
        println!("    Profile:      {}", summary.profile);
        println!("    RPU format:   {:#06x}", summary.rpu_format);
        println!(
            "    Bit depths:   BL {} / EL {} / VDR {}",
            summary.bl_bit_depth, summary.el_bit_depth, summary.vdr_bit_depth
        );
        println!("    Denominator:  2^{}", summary.coefficient_log2_denom);
        println!(
            "    Residual:     {}",
            if summary.residual { "enabled" } else { "disabled" }
        );
        if summary.reuses_previous {
            println!("    Mapping:      reuses previous RPU");
        }
        println!("    NLQ pivots:   {}", summary.nlq_pivots);

        if let Some(nlq) = &summary.nlq {
            for (c, name) in ["Y", "U", "V"].iter().enumerate() {
                println!(
                    "    NLQ {name}:        offset {} slope {}.{} threshold {}.{}",
                    nlq.nlq_offset[c],
                    nlq.linear_deadzone_slope_int[c],
                    nlq.linear_deadzone_slope[c],
                    nlq.linear_deadzone_threshold_int[c],
                    nlq.linear_deadzone_threshold[c]
                );
            }
        }

        if let Some(error) = &summary.error {
            println!("    {} {}", style("Unusable:").red().bold(), error);
        }
    }
}
