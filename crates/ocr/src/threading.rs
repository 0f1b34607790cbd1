use ort::session::builder::SessionBuilder;
use ort::Error;

const DEFAULT_MAX_THREADS: usize = 4;

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse::<T>().ok()
}

/// (intra, inter) 线程数
///
/// `IDCHECK_OCR_THREADS` / `IDCHECK_OCR_INTER_THREADS` 可覆盖默认值。
pub(crate) fn thread_settings() -> (usize, usize) {
    let intra = env_parse::<usize>("IDCHECK_OCR_THREADS")
        .filter(|v| *v > 0)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(DEFAULT_MAX_THREADS)
                .clamp(1, DEFAULT_MAX_THREADS)
        });
    let inter = env_parse::<usize>("IDCHECK_OCR_INTER_THREADS")
        .filter(|v| *v > 0)
        .unwrap_or(1);
    (intra, inter)
}

pub(crate) fn apply_session_threads(builder: SessionBuilder) -> Result<SessionBuilder, Error> {
    let (intra, inter) = thread_settings();
    log::info!("[OCR] 线程设置: intra={}, inter={}", intra, inter);

    builder
        .with_intra_threads(intra)?
        .with_inter_threads(inter)?
        .with_parallel_execution(false)
}
