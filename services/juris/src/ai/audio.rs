//! services/juris/src/ai/audio.rs
//!
//! Normalizes recorded audio before it is sent for transcription. Encoded
//! formats pass through; raw 16-bit PCM is wrapped in a WAV container since
//! the provider cannot infer its layout.

use hound::{SampleFormat, WavSpec, WavWriter};
use juris_core::domain::Attachment;
use juris_core::ports::{PortError, PortResult};

const DEFAULT_SAMPLE_RATE: u32 = 48_000;

fn is_raw_pcm(mime_type: &str) -> bool {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("audio/pcm") || essence.eq_ignore_ascii_case("audio/l16")
}

/// Reads `rate=NNNN` from a mime type such as `audio/L16;rate=16000`.
fn sample_rate(mime_type: &str) -> u32 {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse().ok())
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}

fn pcm16_to_wav(pcm_data: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = std::io::Cursor::new(Vec::new());

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for chunk in pcm_data.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

/// Returns audio the provider can read inline.
pub fn prepare_audio(audio: Attachment) -> PortResult<Attachment> {
    if audio.data.is_empty() {
        return Err(PortError::Validation("O áudio enviado está vazio.".to_string()));
    }

    if is_raw_pcm(&audio.mime_type) {
        let wav = pcm16_to_wav(&audio.data, sample_rate(&audio.mime_type))
            .map_err(|e| PortError::Validation(format!("Failed to encode WAV: {}", e)))?;
        let stem = audio
            .file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&audio.file_name);
        return Ok(Attachment::new(format!("{}.wav", stem), "audio/wav", wav));
    }

    if audio.mime_type.to_ascii_lowercase().starts_with("audio/") {
        return Ok(audio);
    }

    Err(PortError::Validation(format!(
        "Formato de áudio não suportado: {}",
        audio.mime_type
    )))
}
