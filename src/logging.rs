use std::path::Path;

pub const LOG_FILE_BASENAME: &str = "taskdeck";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 20 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 10;

/// File logging with size rotation, written next to the user data
/// (data.json, exports/). `TASKDECK_LOG` or `RUST_LOG` override the level
/// spec; dependency logs stay at WARN by default.
pub fn init_logging(data_dir: &Path) -> Result<(), flexi_logger::FlexiLoggerError> {
    use flexi_logger::{detailed_format, Cleanup, Criterion, FileSpec, Logger, Naming, WriteMode};

    std::fs::create_dir_all(data_dir)?;

    Logger::try_with_str(level_spec())?
        .log_to_file(
            FileSpec::default()
                .directory(data_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .start()?;

    install_panic_hook();

    log::info!(
        "logger initialized dir={} rotate_size_bytes={} keep_files={}",
        data_dir.display(),
        LOG_ROTATE_SIZE_BYTES,
        LOG_ROTATE_KEEP_FILES
    );
    Ok(())
}

fn level_spec() -> String {
    let default_spec = if cfg!(debug_assertions) {
        "warn,taskdeck=debug"
    } else {
        "warn,taskdeck=info"
    };
    ["TASKDECK_LOG", "RUST_LOG"]
        .iter()
        .find_map(|name| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
        .unwrap_or_else(|| default_spec.to_string())
}

/// Panics otherwise die silently in a host without a console; route them
/// through the log file before the default hook runs.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");
        let location = info
            .location()
            .map(|loc| format!("{loc}"))
            .unwrap_or_else(|| "<unknown>".to_string());
        log::error!("panic: payload={payload} location={location}");
        default_hook(info);
    }));
}
