//! Engine configurations and the reuse fingerprint.
//!
//! Every family config splits into two parts:
//!
//! - **cold fields** (model files, language, GPU device, decoding sizes):
//!   a change means the engine must be rebuilt, see `requires_rebuild`;
//! - a `*Params` struct of **hot fields** that a running engine accepts in
//!   place through `update_params`.
//!
//! The `build` constructors merge the selector's model config, service
//! settings and per-request options.

use std::path::PathBuf;

use crate::catalog::ModelEngine;
use crate::config::{AppConfig, AudioCtxMode, EngineProfile};
use crate::options::{Options, OptionsExt};
use crate::selector::{MntModelConfig, SttModelConfig, TextRepairModelConfig, TtsModelConfig};

// ---------------------------------------------------------------------------
// Shared option types
// ---------------------------------------------------------------------------

/// Output text format requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Raw,
    Html,
    Markdown,
    SubRip,
}

impl TextFormat {
    /// Read the `text_format` option: a name or its index in
    /// `raw, html, markdown, subrip`.
    pub fn from_options(options: &Options) -> Self {
        if let Some(name) = options.get("text_format").and_then(|v| v.as_str()) {
            match name.to_ascii_lowercase().as_str() {
                "html" => return TextFormat::Html,
                "markdown" | "md" => return TextFormat::Markdown,
                "subrip" | "srt" => return TextFormat::SubRip,
                "raw" => return TextFormat::Raw,
                _ => {}
            }
        }
        match options.int_or("text_format", 0) {
            1 => TextFormat::Html,
            2 => TextFormat::Markdown,
            3 => TextFormat::SubRip,
            _ => TextFormat::Raw,
        }
    }

    /// Narrow to the formats a subtitle-or-plain engine understands.
    fn raw_or_subrip(self) -> Self {
        match self {
            TextFormat::SubRip => TextFormat::SubRip,
            _ => TextFormat::Raw,
        }
    }
}

/// Subtitle segmentation limits for SubRip output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubConfig {
    pub min_segment_dur: u32,
    pub min_line_length: u32,
    pub max_line_length: u32,
}

impl SubConfig {
    pub fn from_options(options: &Options) -> Self {
        let get = |key: &str| u32::try_from(options.int_or(key, 0)).unwrap_or(0);
        Self {
            min_segment_dur: get("sub_min_segment_dur"),
            min_line_length: get("sub_min_line_length"),
            max_line_length: get("sub_max_line_length"),
        }
    }
}

/// How an STT engine segments speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenMode {
    #[default]
    Automatic,
    Manual,
    SingleSentence,
}

// ---------------------------------------------------------------------------
// GPU device
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuApi {
    Cuda,
    Rocm,
    OpenCl,
    OpenVino,
    Vulkan,
}

/// A GPU selected for inference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GpuDevice {
    pub api: GpuApi,
    pub id: i32,
    pub name: String,
}

impl GpuDevice {
    /// Parse `"<API>,<index>,<name>"`.  The name may itself contain commas.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ',').map(str::trim);
        let api = match parts.next()?.to_ascii_lowercase().as_str() {
            "cuda" => GpuApi::Cuda,
            "rocm" => GpuApi::Rocm,
            "opencl" => GpuApi::OpenCl,
            "openvino" => GpuApi::OpenVino,
            "vulkan" => GpuApi::Vulkan,
            _ => return None,
        };
        let id = parts.next()?.parse().ok()?;
        let name = parts.next().unwrap_or_default().to_string();
        Some(Self { api, id, name })
    }

    /// Device to use, or `None` for CPU inference.
    pub fn select(use_gpu: bool, device: &str, auto_device: &str) -> Option<Self> {
        if !use_gpu {
            return None;
        }
        let chosen = if device.is_empty() { auto_device } else { device };
        let parsed = Self::parse(chosen);
        if parsed.is_none() && !chosen.is_empty() {
            log::warn!("engine: invalid gpu device {chosen:?}, using cpu");
        }
        parsed
    }
}

// ---------------------------------------------------------------------------
// STT
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioCtx {
    pub mode: AudioCtxMode,
    pub size: i32,
}

impl Default for AudioCtx {
    fn default() -> Self {
        Self {
            mode: AudioCtxMode::Dynamic,
            size: 1500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SttModelFiles {
    pub model_file: PathBuf,
    pub scorer_file: Option<PathBuf>,
    pub openvino_file: Option<PathBuf>,
    pub punctuation_file: Option<PathBuf>,
}

/// Hot-settable STT parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SttParams {
    pub speech_mode: ListenMode,
    pub text_format: TextFormat,
    pub sub_config: SubConfig,
    pub insert_stats: bool,
    pub initial_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SttEngineConfig {
    pub engine: ModelEngine,
    pub model_id: String,
    pub model_files: SttModelFiles,
    pub lang: String,
    pub lang_code: String,
    /// Translate the transcript to English while decoding.
    pub translate: bool,
    pub gpu: Option<GpuDevice>,
    pub beam_search: i32,
    pub cpu_threads: i32,
    pub audio_ctx: AudioCtx,
    pub cache_dir: PathBuf,
    pub options: String,
    pub params: SttParams,
}

impl SttEngineConfig {
    pub fn build(
        model: &SttModelConfig,
        mode: ListenMode,
        out_lang: &str,
        app: &AppConfig,
        options: &Options,
    ) -> Self {
        let text_format = match TextFormat::from_options(options) {
            f @ (TextFormat::Raw | TextFormat::SubRip) => f,
            other => {
                log::warn!("engine: stt does not support {other:?} output, using raw");
                TextFormat::Raw
            }
        };

        let (beam_search, cpu_threads, audio_ctx) = if model.engine.is_whisper_family() {
            match app.stt.profile {
                EngineProfile::Performance => (2, 4, AudioCtx::default()),
                EngineProfile::Quality => (
                    5,
                    4,
                    AudioCtx {
                        mode: AudioCtxMode::NoChange,
                        size: 1500,
                    },
                ),
                EngineProfile::Custom => (
                    app.stt.beam_search,
                    app.stt.cpu_threads,
                    AudioCtx {
                        mode: app.stt.audio_ctx_mode,
                        size: app.stt.audio_ctx_size,
                    },
                ),
            }
        } else {
            (0, 0, AudioCtx::default())
        };

        Self {
            engine: model.engine,
            model_id: model.model_id.clone(),
            model_files: SttModelFiles {
                model_file: model.model_file.clone(),
                scorer_file: model.scorer_file.clone(),
                openvino_file: model.openvino_file.clone(),
                punctuation_file: model.punctuation.as_ref().map(|p| p.model_file.clone()),
            },
            lang: model.lang_id.clone(),
            lang_code: model.lang_code.clone(),
            translate: out_lang == "en" && model.lang_id != "en",
            gpu: GpuDevice::select(app.stt.use_gpu, &app.stt.gpu_device, &app.stt.auto_gpu_device),
            beam_search,
            cpu_threads,
            audio_ctx,
            cache_dir: app.cache_dir(),
            options: model.options.clone(),
            params: SttParams {
                speech_mode: mode,
                text_format,
                sub_config: SubConfig::from_options(options),
                insert_stats: options.bool_or("insert_stats", false),
                initial_prompt: options.str_or("initial_prompt", "").to_string(),
            },
        }
    }

    /// `true` when `next` cannot be applied to an engine built from `self`.
    pub fn requires_rebuild(&self, next: &Self) -> bool {
        self.engine != next.engine
            || self.model_files != next.model_files
            || self.lang != next.lang
            || self.translate != next.translate
            || self.gpu != next.gpu
            || self.audio_ctx != next.audio_ctx
            || self.cpu_threads != next.cpu_threads
            || self.beam_search != next.beam_search
    }
}

// ---------------------------------------------------------------------------
// TTS
// ---------------------------------------------------------------------------

/// Subtitle timing when synthesizing SubRip input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubtitlesSync {
    #[default]
    Off,
    OnDontFit,
    OnAlwaysFit,
    OnFitOnlyIfLonger,
}

/// Handling of markup tags in synthesized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMode {
    #[default]
    Disable,
    Ignore,
    Support,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TtsModelFiles {
    pub model_file: PathBuf,
    pub vocoder_file: Option<PathBuf>,
    pub diacritizer_file: Option<PathBuf>,
    /// Directory holding the model, used by engines that load by folder.
    pub hub_dir: PathBuf,
}

/// Hot-settable TTS parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsParams {
    /// 1 (slowest) to 20 (fastest); 10 is normal speed.
    pub speech_speed: u8,
    pub ref_voice_file: Option<PathBuf>,
    pub ref_prompt: String,
    pub text_format: TextFormat,
    pub sync_subs: SubtitlesSync,
    pub split_into_sentences: bool,
    pub use_engine_speed_control: bool,
    pub tag_mode: TagMode,
    pub normalize_audio: bool,
    pub speaker: String,
    pub lang: String,
    pub lang_code: String,
}

impl Default for TtsParams {
    fn default() -> Self {
        Self {
            speech_speed: 10,
            ref_voice_file: None,
            ref_prompt: String::new(),
            text_format: TextFormat::Raw,
            sync_subs: SubtitlesSync::Off,
            split_into_sentences: true,
            use_engine_speed_control: true,
            tag_mode: TagMode::Disable,
            normalize_audio: true,
            speaker: String::new(),
            lang: String::new(),
            lang_code: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsEngineConfig {
    pub engine: ModelEngine,
    pub model_id: String,
    pub model_files: TtsModelFiles,
    pub lang: String,
    pub lang_code: String,
    pub speaker: String,
    pub gpu: Option<GpuDevice>,
    pub cache_dir: PathBuf,
    pub options: String,
    pub params: TtsParams,
}

impl TtsEngineConfig {
    pub fn build(model: &TtsModelConfig, app: &AppConfig, options: &Options) -> Self {
        let speech_speed = options.int_or("speech_speed", 10).clamp(1, 20) as u8;

        let sync_subs = match options.int_or("sync_subs", 0) {
            1 => SubtitlesSync::OnDontFit,
            2 => SubtitlesSync::OnAlwaysFit,
            3 => SubtitlesSync::OnFitOnlyIfLonger,
            _ => SubtitlesSync::Off,
        };

        let tag_mode = match options.int_or("tag_mode", 0) {
            1 => TagMode::Ignore,
            2 => TagMode::Support,
            _ => TagMode::Disable,
        };

        let ref_voice_file = match options.str_or("ref_voice_file", "") {
            "" => None,
            path => Some(PathBuf::from(path)),
        };

        Self {
            engine: model.engine,
            model_id: model.model_id.clone(),
            model_files: TtsModelFiles {
                model_file: model.model_file.clone(),
                vocoder_file: model.vocoder_file.clone(),
                diacritizer_file: model.diacritizer_file.clone(),
                hub_dir: model
                    .model_file
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_default(),
            },
            lang: model.lang_id.clone(),
            lang_code: model.lang_code.clone(),
            speaker: model.speaker.clone(),
            gpu: GpuDevice::select(app.tts.use_gpu, &app.tts.gpu_device, &app.tts.auto_gpu_device),
            cache_dir: app.cache_dir(),
            options: model.options.clone(),
            params: TtsParams {
                speech_speed,
                ref_voice_file,
                ref_prompt: options.str_or("ref_prompt", "").to_string(),
                text_format: TextFormat::from_options(options).raw_or_subrip(),
                sync_subs,
                split_into_sentences: options.bool_or("split_into_sentences", true),
                use_engine_speed_control: options.bool_or("use_engine_speed_control", true),
                tag_mode,
                normalize_audio: options.bool_or("normalize_audio", true),
                speaker: model.speaker.clone(),
                lang: model.lang_id.clone(),
                lang_code: model.lang_code.clone(),
            },
        }
    }

    /// Speaker and language only force a rebuild on engines that bake them
    /// into the loaded voice.
    pub fn requires_rebuild(&self, next: &Self) -> bool {
        self.engine != next.engine
            || self.model_files != next.model_files
            || (self.engine.speaker_needs_restart() && self.speaker != next.speaker)
            || (self.engine.lang_needs_restart() && self.lang != next.lang)
            || self.gpu != next.gpu
    }
}

// ---------------------------------------------------------------------------
// MNT
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MntModelFiles {
    pub model_file: PathBuf,
    /// Second leg for pivot translation.
    pub pivot_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MntParams {
    pub clean_text: bool,
    pub text_format: TextFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MntEngineConfig {
    pub model_id: String,
    pub model_files: MntModelFiles,
    pub lang: String,
    pub out_lang: String,
    pub cache_dir: PathBuf,
    pub options: String,
    pub params: MntParams,
}

impl MntEngineConfig {
    pub fn build(model: &MntModelConfig, app: &AppConfig, options: &Options) -> Self {
        Self {
            model_id: model.model_id.clone(),
            model_files: MntModelFiles {
                model_file: model.model_file.clone(),
                pivot_file: model.pivot.as_ref().map(|p| p.model_file.clone()),
            },
            lang: model.lang_id.clone(),
            out_lang: model.out_lang_id.clone(),
            cache_dir: app.cache_dir(),
            options: model.options.clone(),
            params: MntParams {
                clean_text: options.bool_or("clean_text", app.mnt.clean_text),
                text_format: TextFormat::from_options(options),
            },
        }
    }

    pub fn requires_rebuild(&self, next: &Self) -> bool {
        self.model_files != next.model_files || self.lang != next.lang || self.out_lang != next.out_lang
    }
}

// ---------------------------------------------------------------------------
// Text repair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextRepairModelFiles {
    pub diacritizer_ar: Option<PathBuf>,
    pub diacritizer_he: Option<PathBuf>,
    pub punctuation: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextRepairParams {
    pub text_format: TextFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRepairEngineConfig {
    pub model_id: String,
    pub model_files: TextRepairModelFiles,
    pub gpu: Option<GpuDevice>,
    pub params: TextRepairParams,
}

impl TextRepairEngineConfig {
    pub fn build(model: &TextRepairModelConfig, app: &AppConfig, options: &Options) -> Self {
        let file = |m: &Option<crate::selector::AuxModel>| m.as_ref().map(|m| m.model_file.clone());
        Self {
            model_id: model.model_id(),
            model_files: TextRepairModelFiles {
                diacritizer_ar: file(&model.diacritizer_ar),
                diacritizer_he: file(&model.diacritizer_he),
                punctuation: file(&model.punctuation),
            },
            gpu: GpuDevice::select(app.tts.use_gpu, &app.tts.gpu_device, &app.tts.auto_gpu_device),
            params: TextRepairParams {
                text_format: TextFormat::from_options(options).raw_or_subrip(),
            },
        }
    }

    pub fn requires_rebuild(&self, next: &Self) -> bool {
        self.model_files != next.model_files || self.gpu != next.gpu
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
