use indicatif::ProgressStyle;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

pub fn progress_style() -> Option<ProgressStyle> {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise} / {eta_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .ok()
        .map(|style| style.progress_chars("##-"))
}

/// Turns `span` into a progress bar of `len` steps. Only rendered when the
/// subscriber carries an `IndicatifLayer`; otherwise a no-op.
pub fn attach_progress_bar(span: &Span, len: u64, msg: String) {
    if let Some(style) = progress_style() {
        span.pb_set_style(&style);
    }
    span.pb_set_length(len);
    span.pb_set_message(&msg);
}
