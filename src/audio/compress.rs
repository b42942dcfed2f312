//! Merging synthesized segments and transcoding for playback.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{AudioFormat, AudioQuality};

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    #[error("{0:?} is not supported by this compressor")]
    Unsupported(AudioFormat),

    #[error("input {} has a different sample format", .0.display())]
    FormatMismatch(PathBuf),

    #[error("nothing to merge")]
    NoInput,
}

/// Audio file assembly.  Implementations may shell out to an encoder; the
/// task manager calls them from the control loop, one segment at a time.
pub trait MediaCompressor: Send {
    /// Concatenate `inputs` into `output` encoded as `format`.
    fn merge(
        &mut self,
        inputs: &[PathBuf],
        output: &Path,
        format: AudioFormat,
        quality: AudioQuality,
    ) -> Result<(), CompressError>;

    /// Decode `input` into a WAV file the player can handle directly.
    fn decode_to_wav(&mut self, input: &Path, output: &Path) -> Result<(), CompressError>;
}

/// [`MediaCompressor`] for WAV-only pipelines, built on `hound`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavCompressor;

impl MediaCompressor for WavCompressor {
    fn merge(
        &mut self,
        inputs: &[PathBuf],
        output: &Path,
        format: AudioFormat,
        _quality: AudioQuality,
    ) -> Result<(), CompressError> {
        if format != AudioFormat::Wav {
            return Err(CompressError::Unsupported(format));
        }
        let (first, rest) = inputs.split_first().ok_or(CompressError::NoInput)?;

        let reader = hound::WavReader::open(first)?;
        let spec = reader.spec();
        let mut writer = hound::WavWriter::create(output, spec)?;
        copy_samples(reader, &mut writer)?;

        for input in rest {
            let reader = hound::WavReader::open(input)?;
            if reader.spec() != spec {
                return Err(CompressError::FormatMismatch(input.clone()));
            }
            copy_samples(reader, &mut writer)?;
        }

        writer.finalize()?;
        log::debug!("audio: merged {} files into {}", inputs.len(), output.display());
        Ok(())
    }

    fn decode_to_wav(&mut self, input: &Path, output: &Path) -> Result<(), CompressError> {
        match AudioFormat::from_path(input) {
            Some(AudioFormat::Wav) => {
                std::fs::copy(input, output)?;
                Ok(())
            }
            Some(other) => Err(CompressError::Unsupported(other)),
            None => Err(CompressError::FormatMismatch(input.to_path_buf())),
        }
    }
}

fn copy_samples<R: std::io::Read>(
    reader: hound::WavReader<R>,
    writer: &mut hound::WavWriter<std::io::BufWriter<std::fs::File>>,
) -> Result<(), CompressError> {
    let spec = reader.spec();
    match spec.sample_format {
        hound::SampleFormat::Float => {
            for s in reader.into_samples::<f32>() {
                writer.write_sample(s?)?;
            }
        }
        hound::SampleFormat::Int => {
            for s in reader.into_samples::<i32>() {
                writer.write_sample(s?)?;
            }
        }
    }
    Ok(())
}
