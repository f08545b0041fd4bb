//! Encoder sinks: where exported composite frames go.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use dualsync_common::error::{SyncError, SyncResult};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Accepts a sequence of frames and muxes them to a file.
pub trait EncoderSink: Send {
    /// Prepare the output for frames of `width` x `height`.
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        frame_interval_ms: f64,
    ) -> SyncResult<()>;

    /// Append one frame.
    fn write_frame(&mut self, frame: &RgbaImage) -> SyncResult<()>;

    /// Finish the output. `finalize == false` discards it.
    fn close(&mut self, finalize: bool) -> SyncResult<()>;
}

impl<S: EncoderSink + ?Sized> EncoderSink for Box<S> {
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        frame_interval_ms: f64,
    ) -> SyncResult<()> {
        (**self).open(path, width, height, frame_interval_ms)
    }

    fn write_frame(&mut self, frame: &RgbaImage) -> SyncResult<()> {
        (**self).write_frame(frame)
    }

    fn close(&mut self, finalize: bool) -> SyncResult<()> {
        (**self).close(finalize)
    }
}

/// Sidecar written next to a finalized raw video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawVideoHeader {
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    pub frame_interval_ms: f64,
    pub pixel_format: String,
    pub finalized_at: String,
}

/// Writes packed RGBA8 frames back to back into a single file.
///
/// Finalizing writes a `<path>.json` sidecar describing the stream.
#[derive(Debug, Default)]
pub struct RawVideoSink {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    width: u32,
    height: u32,
    frame_interval_ms: f64,
    frames_written: u64,
}

impl RawVideoSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames written since the last open.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Sidecar location for a raw video path.
    pub fn header_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    }
}

impl EncoderSink for RawVideoSink {
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        frame_interval_ms: f64,
    ) -> SyncResult<()> {
        if self.writer.is_some() {
            return Err(SyncError::encoder("Sink is already open"));
        }
        if width == 0 || height == 0 {
            return Err(SyncError::encoder(format!(
                "Invalid frame size {width}x{height}"
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| {
                SyncError::encoder(format!("Failed to open {}: {e}", path.display()))
            })?;

        self.writer = Some(BufWriter::new(file));
        self.path = Some(path.to_path_buf());
        self.width = width;
        self.height = height;
        self.frame_interval_ms = frame_interval_ms;
        self.frames_written = 0;
        tracing::debug!(path = %path.display(), width, height, "Raw video sink opened");
        Ok(())
    }

    fn write_frame(&mut self, frame: &RgbaImage) -> SyncResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SyncError::encoder("Sink is not open"))?;
        if frame.dimensions() != (self.width, self.height) {
            return Err(SyncError::encoder(format!(
                "Frame size {}x{} does not match stream size {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        writer
            .write_all(frame.as_raw())
            .map_err(|e| SyncError::encoder(format!("Failed to write frame: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self, finalize: bool) -> SyncResult<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        let path = self.path.take().unwrap_or_default();

        if !finalize {
            tracing::debug!(path = %path.display(), "Raw video sink discarded");
            return Ok(());
        }

        writer
            .flush()
            .map_err(|e| SyncError::encoder(format!("Failed to flush video: {e}")))?;

        let header = RawVideoHeader {
            width: self.width,
            height: self.height,
            frame_count: self.frames_written,
            frame_interval_ms: self.frame_interval_ms,
            pixel_format: "rgba8".to_string(),
            finalized_at: chrono::Utc::now().to_rfc3339(),
        };
        std::fs::write(
            Self::header_path(&path),
            serde_json::to_string_pretty(&header)?,
        )?;
        tracing::info!(
            path = %path.display(),
            frames = self.frames_written,
            "Raw video finalized"
        );
        Ok(())
    }
}

/// Pipes RGBA frames into an `ffmpeg` process that encodes and muxes them.
///
/// The container follows the output extension. Discarding kills the process.
#[derive(Debug)]
pub struct FfmpegSink {
    program: PathBuf,
    codec_args: Vec<String>,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr_task: Option<JoinHandle<String>>,
    path: Option<PathBuf>,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl Default for FfmpegSink {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            codec_args: ["-c:v", "libx264", "-preset", "medium", "-crf", "18"]
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
            child: None,
            stdin: None,
            stderr_task: None,
            path: None,
            width: 0,
            height: 0,
            frames_written: 0,
        }
    }
}

impl FfmpegSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another ffmpeg binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the video codec arguments (`-c:v libx264 -preset medium -crf 18`).
    pub fn with_codec_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.codec_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Command line handed to ffmpeg for a stream of `width` x `height` frames.
    pub fn ffmpeg_args(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        frame_interval_ms: f64,
    ) -> Vec<String> {
        let fps = 1000.0 / frame_interval_ms.max(0.001);
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        args.push("-s".to_string());
        args.push(format!("{width}x{height}"));
        args.push("-framerate".to_string());
        args.push(format!("{fps:.3}"));
        args.extend(["-i", "-", "-an"].iter().map(|arg| arg.to_string()));
        args.extend(self.codec_args.iter().cloned());
        // yuv420p needs even dimensions on both axes.
        args.extend(
            ["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2", "-pix_fmt", "yuv420p"]
                .iter()
                .map(|arg| arg.to_string()),
        );
        args.push(path.display().to_string());
        args
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default()
    }
}

impl EncoderSink for FfmpegSink {
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        frame_interval_ms: f64,
    ) -> SyncResult<()> {
        if self.child.is_some() {
            return Err(SyncError::encoder("Sink is already open"));
        }
        if width == 0 || height == 0 {
            return Err(SyncError::encoder(format!(
                "Invalid frame size {width}x{height}"
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let args = self.ffmpeg_args(path, width, height, frame_interval_ms);
        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SyncError::encoder(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(stderr)) = (stdin, stderr) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SyncError::encoder("Failed to capture ffmpeg pipes"));
        };

        // Drain stderr so ffmpeg never blocks on a full pipe.
        self.stderr_task = Some(std::thread::spawn(move || -> String {
            let mut output = String::new();
            match BufReader::new(stderr).read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        }));

        tracing::info!(
            pid = child.id(),
            path = %path.display(),
            width,
            height,
            "ffmpeg process started"
        );
        self.stdin = Some(BufWriter::new(stdin));
        self.child = Some(child);
        self.path = Some(path.to_path_buf());
        self.width = width;
        self.height = height;
        self.frames_written = 0;
        Ok(())
    }

    fn write_frame(&mut self, frame: &RgbaImage) -> SyncResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SyncError::encoder("Sink is not open"))?;
        if frame.dimensions() != (self.width, self.height) {
            return Err(SyncError::encoder(format!(
                "Frame size {}x{} does not match stream size {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| SyncError::encoder(format!("Failed to pipe frame to ffmpeg: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self, finalize: bool) -> SyncResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let stdin = self.stdin.take();
        let path = self.path.take().unwrap_or_default();

        if !finalize {
            drop(stdin);
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "ffmpeg already exited");
            }
            let _ = child.wait();
            self.collect_stderr();
            tracing::debug!(path = %path.display(), "ffmpeg output discarded");
            return Ok(());
        }

        // ffmpeg writes the trailer once its input is closed.
        let flushed = match stdin {
            Some(mut stdin) => {
                let result = stdin.flush();
                drop(stdin);
                result
            }
            None => Ok(()),
        };
        let status = child
            .wait()
            .map_err(|e| SyncError::encoder(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = self.collect_stderr();

        if !status.success() {
            return Err(SyncError::encoder(format!(
                "ffmpeg export failed (status {status}): {}",
                stderr_output.trim()
            )));
        }
        flushed.map_err(|e| SyncError::encoder(format!("Failed to flush ffmpeg input: {e}")))?;

        tracing::info!(
            path = %path.display(),
            frames = self.frames_written,
            "ffmpeg output finalized"
        );
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// In-memory sink recording everything it receives.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Path, width and height passed to `open`.
    pub opened: Option<(PathBuf, u32, u32)>,
    pub frames: Vec<RgbaImage>,
    /// One entry per `close` call, `true` for finalize.
    pub closes: Vec<bool>,
    /// Refuse to open.
    pub fail_open: bool,
    /// Fail the write of this zero-based frame.
    pub fail_write_at: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }
}

impl EncoderSink for MemorySink {
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        _frame_interval_ms: f64,
    ) -> SyncResult<()> {
        if self.fail_open {
            return Err(SyncError::encoder("Refusing to open"));
        }
        self.opened = Some((path.to_path_buf(), width, height));
        Ok(())
    }

    fn write_frame(&mut self, frame: &RgbaImage) -> SyncResult<()> {
        if self.fail_write_at == Some(self.frames.len()) {
            return Err(SyncError::encoder("Write failed"));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn close(&mut self, finalize: bool) -> SyncResult<()> {
        self.closes.push(finalize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn raw_sink_writes_frames_and_header() {
        let dir = std::env::temp_dir().join("dualsync_test_raw_sink");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("out.rgba");

        let frame = RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 255]));
        let mut sink = RawVideoSink::new();
        sink.open(&path, 4, 2, 40.0).unwrap();
        sink.write_frame(&frame).unwrap();
        sink.write_frame(&frame).unwrap();
        sink.close(true).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 2 * 4 * 2 * 4);

        let header: RawVideoHeader =
            serde_json::from_str(&std::fs::read_to_string(RawVideoSink::header_path(&path)).unwrap())
                .unwrap();
        assert_eq!(header.frame_count, 2);
        assert_eq!(header.pixel_format, "rgba8");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn raw_sink_rejects_size_change() {
        let dir = std::env::temp_dir().join("dualsync_test_raw_sink_size");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("out.rgba");

        let mut sink = RawVideoSink::new();
        sink.open(&path, 4, 2, 40.0).unwrap();
        let wrong = RgbaImage::new(2, 2);
        assert!(sink.write_frame(&wrong).is_err());
        sink.close(false).unwrap();
        assert!(!RawVideoSink::header_path(&path).exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    fn ffmpeg_available() -> bool {
        std::process::Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[test]
    fn ffmpeg_args_describe_raw_rgba_input() {
        let sink = FfmpegSink::new();
        let args = sink.ffmpeg_args(Path::new("/tmp/out.mp4"), 128, 36, 40.0);
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 128x36 -framerate 25.000 -i -"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));

        let custom = FfmpegSink::new().with_codec_args(["-c:v", "mpeg4"]);
        let args = custom.ffmpeg_args(Path::new("out.avi"), 4, 2, 20.0);
        assert!(args.join(" ").contains("-framerate 50.000 -i - -an -c:v mpeg4 -vf"));
    }

    #[test]
    fn ffmpeg_sink_reports_missing_binary_on_open() {
        let mut sink = FfmpegSink::new().with_program("/nonexistent/dualsync-ffmpeg");
        let result = sink.open(&std::env::temp_dir().join("dualsync_missing.mp4"), 4, 2, 40.0);
        assert!(result.is_err());
        assert!(sink.write_frame(&RgbaImage::new(4, 2)).is_err());
        sink.close(false).unwrap();
    }

    #[test]
    fn ffmpeg_sink_encodes_a_playable_file() {
        if !ffmpeg_available() {
            eprintln!("ffmpeg not found, skipping encode test");
            return;
        }
        let dir = std::env::temp_dir().join("dualsync_test_ffmpeg_sink");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("out.mp4");

        let frame = RgbaImage::from_pixel(16, 8, Rgba([200, 40, 40, 255]));
        let mut sink = FfmpegSink::new().with_codec_args(["-c:v", "mpeg4"]);
        sink.open(&path, 16, 8, 40.0).unwrap();
        for _ in 0..5 {
            sink.write_frame(&frame).unwrap();
        }
        sink.close(true).unwrap();
        assert_eq!(sink.frames_written(), 5);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn memory_sink_records_close_mode() {
        let mut sink = MemorySink::new();
        sink.open(Path::new("x"), 2, 2, 40.0).unwrap();
        sink.close(false).unwrap();
        assert_eq!(sink.closes, vec![false]);
    }
}
