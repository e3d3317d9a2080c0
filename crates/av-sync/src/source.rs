//! Turning media files into mono waveforms

use crate::config::ExtractionConfig;
use crate::waveform::{downmix, Waveform};
use crate::{Result, SyncError};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tempfile::TempDir;

/// Scratch directory owned by one comparison; removed when dropped
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `root`, or the system temp dir
    pub fn acquire(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("av-sync-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        log::debug!("workspace acquired at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting failures
    pub fn release(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        log::debug!("workspace released at {}", path.display());
        Ok(())
    }
}

/// Produces a mono waveform for a media file
pub trait WaveformSource {
    fn load(&self, media: &Path, workspace: &Workspace) -> Result<Waveform>;
}

/// Extracts audio with an external ffmpeg-compatible program, then decodes the WAV
#[derive(Debug, Clone, Default)]
pub struct FfmpegSource {
    config: ExtractionConfig,
}

impl FfmpegSource {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Derived output path: `<basename>WAV.wav` inside `dir`
    pub fn output_path(dir: &Path, media: &Path) -> PathBuf {
        let mut name = media
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push("WAV.wav");
        dir.join(name)
    }

    /// Run the extraction program, writing a mono WAV into `dir`
    pub fn extract(&self, media: &Path, dir: &Path) -> Result<PathBuf> {
        let output = Self::output_path(dir, media);

        let mut cmd = Command::new(&self.config.program);
        cmd.arg("-y")
            .arg("-nostdin")
            .arg("-i")
            .arg(media)
            .arg("-vn")
            .arg("-ac")
            .arg("1");
        if let Some(rate) = self.config.sample_rate {
            cmd.arg("-ar").arg(rate.to_string());
        }
        cmd.arg("-f").arg("wav").arg(&output);

        log::info!("extracting audio: {:?}", cmd);

        let result = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| SyncError::Extraction {
                path: media.to_path_buf(),
                reason: format!("could not run {}: {}", self.config.program, e),
            })?;

        if !result.status.success() {
            return Err(SyncError::Extraction {
                path: media.to_path_buf(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.config.program,
                    result.status,
                    stderr_tail(&result.stderr)
                ),
            });
        }

        match std::fs::metadata(&output) {
            Ok(meta) if meta.len() > 0 => Ok(output),
            _ => Err(SyncError::Extraction {
                path: media.to_path_buf(),
                reason: format!("no audio written to {}", output.display()),
            }),
        }
    }
}

impl WaveformSource for FfmpegSource {
    fn load(&self, media: &Path, workspace: &Workspace) -> Result<Waveform> {
        let wav = self.extract(media, workspace.path())?;
        read_wav(&wav)
    }
}

/// Decodes audio directly with symphonia, no external program involved
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSource;

impl WaveformSource for NativeSource {
    fn load(&self, media: &Path, _workspace: &Workspace) -> Result<Waveform> {
        decode_native(media)
    }
}

// Last few stderr lines; ffmpeg prints its banner first.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(3);
    let tail = lines[start..].join(" | ");
    if tail.is_empty() {
        "no diagnostic output".into()
    } else {
        tail
    }
}

/// Read a WAV file as mono integer samples
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Waveform> {
    let reader = hound::WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    if spec.sample_rate == 0 || spec.channels == 0 {
        return Err(SyncError::Decode(format!(
            "{}: invalid format ({} Hz, {} channels)",
            path.as_ref().display(),
            spec.sample_rate,
            spec.channels
        )));
    }

    let interleaved: Vec<i32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .into_samples::<i32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        // Float WAVs are mapped onto the 16-bit integer range
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i32))
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    Ok(Waveform::new(
        downmix(&interleaved, spec.channels as usize),
        spec.sample_rate,
    ))
}

/// Decode any symphonia-supported file to mono 16-bit samples
pub fn decode_native<P: AsRef<Path>>(path: P) -> Result<Waveform> {
    let path = path.as_ref();
    let path_str = path.display().to_string();
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| SyncError::Decode(format!("{}: no audio track", path_str)))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| SyncError::Decode(format!("{}: unknown sample rate", path_str)))?;

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();
        let num_channels = spec.channels.count();

        let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        let interleaved: Vec<i32> = buffer.samples().iter().map(|&s| s as i32).collect();
        samples.extend(downmix(&interleaved, num_channels));
    }

    log::debug!("decoded {} samples at {} Hz from {}", samples.len(), sample_rate, path_str);
    Ok(Waveform::new(samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_output_path_derivation() {
        let out = FfmpegSource::output_path(Path::new("/tmp/work"), Path::new("/videos/clip.mp4"));
        assert_eq!(out, PathBuf::from("/tmp/work/clip.mp4WAV.wav"));
    }

    #[test]
    fn test_read_wav_downmixes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[100, 300, -100, -300]);

        let wave = read_wav(&path).unwrap();
        assert_eq!(wave.sample_rate, 8000);
        assert_eq!(wave.samples, vec![200, -200]);
    }

    #[test]
    fn test_read_wav_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"RIFF????not a wave file").unwrap();

        let err = read_wav(&path).unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }

    #[test]
    fn test_native_decode_matches_hound() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono.wav");
        let samples: Vec<i16> = (0..2000).map(|i| ((i * 37) % 2001 - 1000) as i16).collect();
        write_wav(&path, 1, &samples);

        let native = decode_native(&path).unwrap();
        let wav = read_wav(&path).unwrap();
        assert_eq!(native, wav);
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let workspace = Workspace::acquire(None).unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.is_dir());
        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn test_workspace_release() {
        let root = TempDir::new().unwrap();
        let workspace = Workspace::acquire(Some(root.path())).unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.starts_with(root.path()));
        workspace.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_program_is_extraction_error() {
        let workspace = Workspace::acquire(None).unwrap();
        let source = FfmpegSource::new(ExtractionConfig {
            program: "av-sync-no-such-extractor".into(),
            ..Default::default()
        });
        let err = source
            .load(Path::new("clip.mp4"), &workspace)
            .unwrap_err();
        assert!(matches!(err, SyncError::Extraction { .. }));
    }

    #[test]
    fn test_stderr_tail() {
        assert_eq!(stderr_tail(b"banner\n\nline a\nline b\nline c\n"), "line a | line b | line c");
        assert_eq!(stderr_tail(b""), "no diagnostic output");
    }
}
