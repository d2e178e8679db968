//! On-demand video embedding from a pasted URL or the `?video=` query parameter.

use crate::config::LoaderConfig;
use crate::timer::{Millis, ScheduledTask};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

const EMBED_BASE: &str = "https://www.youtube.com/embed/";
const EMBED_PARAMS: &str = "?rel=0&modestbranding=1";
const DEFAULT_MIME: &str = "video/mp4";
const QUERY_KEY: &str = "video";
const LOADED_NOTICE: &str = "Video cargado correctamente";

/// YouTube URL shapes, tried in order; the first capture is the video id.
static YOUTUBE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:youtube\.com/watch\?v=|youtu\.be/)([^&\s]+)",
        r"youtube\.com/embed/([^&\s]+)",
        r"youtube\.com/v/([^&\s]+)",
        r"youtube\.com/watch\?.*v=([^&\s]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid youtube pattern"))
    .collect()
});

static YOUTUBE_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.|m\.)?(?:youtube\.com|youtu\.be)(?:/|$)")
        .expect("valid youtube host pattern")
});

static VIDEO_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mp4|webm|ogg|mov)$").expect("valid extension pattern"));

/// The error text doubles as the on-screen notice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoError {
    #[error("Por favor ingresa una URL válida")]
    Empty,
    #[error("URL no válida. Por favor ingresa una URL de YouTube o un archivo de video.")]
    Unsupported,
    #[error("No se pudo extraer el ID del video de YouTube")]
    MissingVideoId,
    #[error("Error al cargar el archivo de video. Verifica la URL o la ruta del archivo.")]
    Decode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoSource {
    YouTube { id: String },
    File { url: String, mime: &'static str },
}

impl VideoSource {
    /// What the page puts in the iframe or `<source>` `src` attribute.
    pub fn src(&self) -> String {
        match self {
            Self::YouTube { id } => format!("{EMBED_BASE}{id}{EMBED_PARAMS}"),
            Self::File { url, .. } => url.clone(),
        }
    }
}

/// Classifies a user-supplied URL. YouTube forms win over file extensions.
pub fn classify(url: &str) -> Result<VideoSource, VideoError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(VideoError::Empty);
    }
    for pattern in YOUTUBE_PATTERNS.iter() {
        if let Some(id) = pattern.captures(url).and_then(|caps| caps.get(1)) {
            return Ok(VideoSource::YouTube {
                id: id.as_str().to_string(),
            });
        }
    }
    if YOUTUBE_HOST.is_match(url) {
        return Err(VideoError::MissingVideoId);
    }
    if VIDEO_FILE.is_match(url) {
        return Ok(VideoSource::File {
            url: url.to_string(),
            mime: mime_for(url),
        });
    }
    Err(VideoError::Unsupported)
}

/// MIME type from the text after the last dot.
pub fn mime_for(url: &str) -> &'static str {
    let extension = url.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogg" => "video/ogg",
        "mov" => "video/quicktime",
        _ => DEFAULT_MIME,
    }
}

/// Extracts the `video` parameter from a query string (with or without the
/// leading `?`). The value is form-decoded and then percent-decoded once more,
/// so doubly-encoded links still work.
pub fn video_param(query: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let raw = query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (form_decode(key) == QUERY_KEY).then(|| form_decode(value))
    })?;
    if raw.is_empty() {
        return None;
    }
    Some(percent_decode_str(&raw).decode_utf8_lossy().into_owned())
}

fn form_decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

/// The video section's loader form.
#[derive(Debug, Clone)]
pub struct VideoLoader {
    input: String,
    current: Option<VideoSource>,
    notice: Option<Notice>,
    notice_timer: ScheduledTask,
    autoload: ScheduledTask,
}

impl VideoLoader {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            input: String::new(),
            current: None,
            notice: None,
            notice_timer: ScheduledTask::once(config.notice_ms),
            autoload: ScheduledTask::once(config.autoload_delay_ms),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn current(&self) -> Option<&VideoSource> {
        self.current.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Page start: a `video` parameter fills the input and loads shortly after.
    pub fn init_from_query(&mut self, query: &str, now: Millis) -> bool {
        let Some(url) = video_param(query) else {
            return false;
        };
        debug!(%url, "video parameter found");
        self.input = url;
        self.autoload.start(now);
        true
    }

    /// Load button. Blank input produces an error notice.
    pub fn submit(&mut self, input: &str, now: Millis) -> Result<(), VideoError> {
        self.input = input.trim().to_string();
        let url = self.input.clone();
        self.load(&url, now)
    }

    /// Enter in the input box. Blank input is ignored silently.
    pub fn enter(&mut self, input: &str, now: Millis) -> Result<(), VideoError> {
        if input.trim().is_empty() {
            return Ok(());
        }
        self.submit(input, now)
    }

    pub fn load(&mut self, url: &str, now: Millis) -> Result<(), VideoError> {
        match classify(url) {
            Ok(source) => {
                info!(src = %source.src(), "video loaded");
                self.current = Some(source);
                self.show(NoticeKind::Success, LOADED_NOTICE.to_string(), now);
                Ok(())
            }
            Err(err) => {
                warn!(%url, error = %err, "video rejected");
                self.show(NoticeKind::Error, err.to_string(), now);
                Err(err)
            }
        }
    }

    /// The embedded file element reported a decode failure.
    pub fn media_error(&mut self, now: Millis) {
        if matches!(self.current, Some(VideoSource::File { .. })) {
            warn!("video file failed to decode");
            self.show(NoticeKind::Error, VideoError::Decode.to_string(), now);
        }
    }

    /// Runs the deferred query-string load and dismisses expired notices.
    pub fn tick(&mut self, now: Millis) -> Option<Result<(), VideoError>> {
        if self.notice_timer.poll(now) {
            self.notice = None;
        }
        if self.autoload.poll(now) {
            let url = self.input.clone();
            return Some(self.load(&url, now));
        }
        None
    }

    fn show(&mut self, kind: NoticeKind, text: String, now: Millis) {
        self.notice = Some(Notice { kind, text });
        self.notice_timer.restart(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_forms_extract_ids() {
        let cases = [
            ("https://www.youtube.com/watch?v=abc123&t=10", "abc123"),
            ("https://youtu.be/xyz789", "xyz789"),
            ("https://www.youtube.com/embed/emb42", "emb42"),
            ("https://www.youtube.com/v/old1", "old1"),
            ("https://www.youtube.com/watch?feature=share&v=late9", "late9"),
        ];
        for (url, id) in cases {
            assert_eq!(
                classify(url),
                Ok(VideoSource::YouTube { id: id.to_string() }),
                "{url}"
            );
        }
    }

    #[test]
    fn embed_url_carries_player_params() {
        let source = classify("youtu.be/abc").unwrap();
        assert_eq!(
            source.src(),
            "https://www.youtube.com/embed/abc?rel=0&modestbranding=1"
        );
    }

    #[test]
    fn files_by_extension() {
        assert_eq!(
            classify("videos/demo.MOV"),
            Ok(VideoSource::File {
                url: "videos/demo.MOV".into(),
                mime: "video/quicktime"
            })
        );
        assert_eq!(mime_for("clip.webm"), "video/webm");
        assert_eq!(mime_for("clip"), "video/mp4");
        assert_eq!(classify("clip.mp4?x=1"), Err(VideoError::Unsupported));
    }

    #[test]
    fn rejects_empty_unknown_and_idless_youtube() {
        assert_eq!(classify("   "), Err(VideoError::Empty));
        assert_eq!(classify("https://vimeo.com/1"), Err(VideoError::Unsupported));
        assert_eq!(
            classify("https://www.youtube.com/channel/abc"),
            Err(VideoError::MissingVideoId)
        );
    }

    #[test]
    fn query_parameter_is_decoded_twice() {
        assert_eq!(
            video_param("?video=https%253A%252F%252Fyoutu.be%252Fabc"),
            Some("https://youtu.be/abc".to_string())
        );
        assert_eq!(
            video_param("a=1&video=mi+video.mp4"),
            Some("mi video.mp4".to_string())
        );
        assert_eq!(video_param("?video="), None);
        assert_eq!(video_param("?other=x"), None);
    }

    #[test]
    fn loader_autoloads_and_dismisses_notice() {
        let mut loader = VideoLoader::new(&LoaderConfig::default());
        assert!(loader.init_from_query("?video=https%3A%2F%2Fyoutu.be%2Fabc", 0));
        assert_eq!(loader.input(), "https://youtu.be/abc");
        assert!(loader.tick(499).is_none());
        assert_eq!(loader.tick(500), Some(Ok(())));
        assert_eq!(loader.notice().map(|n| n.kind), Some(NoticeKind::Success));
        loader.tick(4_499);
        assert!(loader.notice().is_some());
        loader.tick(4_500);
        assert!(loader.notice().is_none());
    }

    #[test]
    fn blank_submit_reports_but_enter_ignores() {
        let mut loader = VideoLoader::new(&LoaderConfig::default());
        assert_eq!(loader.enter("  ", 0), Ok(()));
        assert!(loader.notice().is_none());
        assert_eq!(loader.submit("  ", 0), Err(VideoError::Empty));
        assert_eq!(
            loader.notice().map(|n| n.text.as_str()),
            Some("Por favor ingresa una URL válida")
        );
    }

    #[test]
    fn decode_failure_only_for_files() {
        let mut loader = VideoLoader::new(&LoaderConfig::default());
        loader.submit("https://youtu.be/abc", 0).unwrap();
        loader.media_error(10);
        assert_eq!(loader.notice().map(|n| n.kind), Some(NoticeKind::Success));

        loader.submit("videos/a.mp4", 20).unwrap();
        loader.media_error(30);
        assert_eq!(loader.notice().map(|n| n.kind), Some(NoticeKind::Error));
    }
}
