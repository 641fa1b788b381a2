//! NLQ reconstruction of raw planar layer files.

use anyhow::{bail, Context};
use clap::{ArgGroup, Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use mapnlq_core::{
    Clip, PixelFormat, RawVideoClip, RawVideoWriter, SharedClip, SharedFrame, Subsampling,
    VideoInfo,
};
use mapnlq_dolby::extractor::split_nal_units;
use mapnlq_dolby::filter::{BL_BIT_DEPTH, EL_BIT_DEPTH};
use mapnlq_dolby::{MapNlq, MapNlqConfig, DEFAULT_RPU_PROP_KEY};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Chroma subsampling of the raw inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChromaFormat {
    /// 4:2:0
    #[value(name = "420")]
    Yuv420,
    /// 4:2:2
    #[value(name = "422")]
    Yuv422,
    /// 4:4:4
    #[value(name = "444")]
    Yuv444,
}

impl From<ChromaFormat> for Subsampling {
    fn from(format: ChromaFormat) -> Self {
        match format {
            ChromaFormat::Yuv420 => Subsampling::Yuv420,
            ChromaFormat::Yuv422 => Subsampling::Yuv422,
            ChromaFormat::Yuv444 => Subsampling::Yuv444,
        }
    }
}

/// Layout of a raw planar video file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawVideoSpec {
    /// Luma width.
    pub width: u32,
    /// Luma height.
    pub height: u32,
    /// Chroma subsampling.
    pub subsampling: Subsampling,
    /// Bits per sample.
    pub bits: u8,
    /// Trailing alpha plane.
    pub alpha: bool,
}

impl RawVideoSpec {
    /// Pixel format of the file.
    pub fn format(&self) -> PixelFormat {
        PixelFormat::yuv(self.subsampling, self.bits).with_alpha(self.alpha)
    }

    /// Open `path` as a clip.
    pub fn open(&self, path: &Path) -> anyhow::Result<RawVideoClip> {
        let info = VideoInfo::new(self.width, self.height, self.format(), 0)?;
        RawVideoClip::open(path, info).with_context(|| format!("cannot open {}", path.display()))
    }
}

/// Reconstruct 12-bit video from a 16-bit BL and a 10-bit EL.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("rpu_source").required(true).args(["rpu", "attach_rpu"])))]
pub struct CmdMap {
    /// Base layer: raw little-endian planar, 16 bits per sample.
    #[arg(long)]
    pub bl: PathBuf,

    /// Enhancement layer: raw little-endian planar, 10 bits per sample in
    /// 16-bit words, half the BL width and height.
    #[arg(long)]
    pub el: PathBuf,

    /// BL width in pixels.
    #[arg(long)]
    pub width: u32,

    /// BL height in pixels.
    #[arg(long)]
    pub height: u32,

    /// Chroma subsampling of both layers.
    #[arg(long, value_enum, default_value = "420")]
    pub format: ChromaFormat,

    /// Both layers carry a trailing alpha plane.
    #[arg(long)]
    pub alpha: bool,

    /// RPU file parsed once up front (one RPU per frame).
    #[arg(long)]
    pub rpu: Option<PathBuf>,

    /// RPU file whose NAL units are attached to the EL frames and decoded
    /// per frame.
    #[arg(long)]
    pub attach_rpu: Option<PathBuf>,

    /// Frame property carrying attached RPUs.
    #[arg(long, default_value = DEFAULT_RPU_PROP_KEY)]
    pub rpu_key: String,

    /// Output file: raw little-endian planar, 12 bits per sample.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Worker threads (default: all cores).
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Overwrite the output file if it exists.
    #[arg(short = 'y', long)]
    pub overwrite: bool,

    /// Disable the progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

impl CmdMap {
    /// Execute the map command.
    pub fn run(&self) -> anyhow::Result<()> {
        if self.output.exists() && !self.overwrite {
            bail!(
                "output file {} exists (use -y to overwrite)",
                self.output.display()
            );
        }

        let bl_spec = RawVideoSpec {
            width: self.width,
            height: self.height,
            subsampling: self.format.into(),
            bits: BL_BIT_DEPTH,
            alpha: self.alpha,
        };
        let el_spec = RawVideoSpec {
            width: self.width / 2,
            height: self.height / 2,
            bits: EL_BIT_DEPTH,
            ..bl_spec
        };

        let bl: SharedClip = Arc::new(bl_spec.open(&self.bl)?);
        let mut el: SharedClip = Arc::new(el_spec.open(&self.el)?);

        let mut config = MapNlqConfig::default().with_rpu_prop_key(&self.rpu_key);
        if let Some(path) = &self.rpu {
            config = config.with_rpu_path(path);
        }
        if let Some(path) = &self.attach_rpu {
            el = Arc::new(AttachRpuClip::open(el, path, &self.rpu_key)?);
        }

        let filter = MapNlq::new(bl, el, &config)?;
        let threads = self.threads.unwrap_or_else(rayon::current_num_threads).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("cannot create the worker pool")?;

        let total = filter.info().num_frames;
        info!(frames = total, threads, output = %self.output.display(), "Reconstructing");

        let progress = (!self.no_progress).then(|| create_progress_bar(total as u64));
        let start = Instant::now();

        let file = File::create(&self.output)
            .with_context(|| format!("cannot create {}", self.output.display()))?;
        let mut writer = RawVideoWriter::new(BufWriter::new(file));

        // Frames are reconstructed a batch at a time and written in order.
        let batch = threads * 2;
        for first in (0..total).step_by(batch) {
            let last = (first + batch).min(total);
            let frames: Vec<(usize, mapnlq_dolby::Result<SharedFrame>)> = pool.install(|| {
                (first..last)
                    .into_par_iter()
                    .map(|n| (n, filter.get_frame(n)))
                    .collect()
            });

            for (n, frame) in frames {
                let frame = frame.with_context(|| format!("frame {n}"))?;
                writer.write_frame(&frame)?;
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
            }
            debug!(first, last, "Wrote batch");
        }

        let written = writer.frames_written();
        writer.finish()?;
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let elapsed = start.elapsed();
        println!(
            "{} {} frames in {} ({:.1} fps)",
            style("Reconstructed").green().bold(),
            written,
            format_duration(elapsed),
            written as f64 / elapsed.as_secs_f64().max(1e-9)
        );
        println!(
            "{} {}",
            style("Output saved to:").white(),
            style(self.output.display()).green().bold()
        );
        Ok(())
    }
}

/// Attaches the NAL units of an RPU file to the frames of a clip.
struct AttachRpuClip {
    inner: SharedClip,
    key: String,
    nalus: Vec<Vec<u8>>,
}

impl AttachRpuClip {
    fn open(inner: SharedClip, path: &Path, key: &str) -> anyhow::Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        let nalus: Vec<Vec<u8>> = split_nal_units(&data).into_iter().map(<[u8]>::to_vec).collect();
        if nalus.is_empty() {
            bail!("{} contains no NAL units", path.display());
        }
        debug!(count = nalus.len(), key, "Attaching RPUs");

        Ok(Self {
            inner,
            key: key.to_string(),
            nalus,
        })
    }
}

impl Clip for AttachRpuClip {
    fn info(&self) -> &VideoInfo {
        self.inner.info()
    }

    fn get_frame(&self, n: usize) -> mapnlq_core::Result<SharedFrame> {
        let frame = self.inner.get_frame(n)?;
        let Some(nalu) = self.nalus.get(n) else {
            return Ok(frame);
        };

        let mut frame = Arc::try_unwrap(frame).unwrap_or_else(|shared| (*shared).clone());
        frame.props.set_data(self.key.as_str(), nalu.clone());
        Ok(Arc::new(frame))
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} frames | ETA: {eta}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn format_duration(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    if seconds >= 3600 {
        format!("{}h{}m{}s", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
    } else if seconds >= 60 {
        format!("{}m{}s", seconds / 60, seconds % 60)
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}
