//! Logging through the `log` facade, configured with `log4rs`.

mod consts;

pub use consts::*;

use crate::foundation::{Result, TssError};
use crate::infrastructure::config::LoggingConfig;
use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        rolling_file::{
            policy::compound::{roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy},
            RollingFileAppender,
        },
    },
    config::{Appender, Logger, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::io::IsTerminal;
use std::path::Path;

const CONSOLE_APPENDER: &str = "stderr";
const LOG_FILE_APPENDER: &str = "log_file";
const ERR_LOG_FILE_APPENDER: &str = "err_log_file";

/// Initialize the process logger with optional file output.
///
/// `filters` is a comma separated list: a bare level applies to this crate
/// (default `info`), `<crate>=<level>` opts a dependency in, and `root=<level>`
/// opts every crate in. Without a root override everything outside
/// [`WHITELISTED_CRATES`] stays off.
///
/// The logger is global; repeated calls are ignored.
pub fn init_logger(log_dir: Option<&str>, filters: &str) -> Result<()> {
    let LogFilters { app_level, root_level, modules: module_levels } = LogFilters::parse(filters);
    let root_level = root_level.unwrap_or(LevelFilter::Off);

    let console_pattern = if std::io::stderr().is_terminal() { LOG_LINE_PATTERN_COLORED } else { LOG_LINE_PATTERN };
    let console =
        ConsoleAppender::builder().target(Target::Stderr).encoder(Box::new(PatternEncoder::new(console_pattern))).build();

    let mut config_builder = Config::builder().appender(Appender::builder().build(CONSOLE_APPENDER, Box::new(console)));
    let mut root_appenders: Vec<&str> = vec![CONSOLE_APPENDER];

    if let Some(dir) = log_dir.map(str::trim).filter(|dir| !dir.is_empty()) {
        let dir = Path::new(dir);
        let file_appender = rolling_appender(dir, LOG_FILE_NAME)?;
        config_builder = config_builder.appender(Appender::builder().build(LOG_FILE_APPENDER, Box::new(file_appender)));
        root_appenders.push(LOG_FILE_APPENDER);

        let err_file_appender = rolling_appender(dir, ERR_LOG_FILE_NAME)?;
        config_builder = config_builder.appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Warn)))
                .build(ERR_LOG_FILE_APPENDER, Box::new(err_file_appender)),
        );
        root_appenders.push(ERR_LOG_FILE_APPENDER);
    }

    let appender_names: Vec<String> = root_appenders.iter().map(|name| (*name).to_string()).collect();

    for crate_name in WHITELISTED_CRATES {
        if !module_levels.iter().any(|(module, _)| module.as_str() == *crate_name) {
            config_builder = config_builder
                .logger(Logger::builder().appenders(appender_names.clone()).additive(false).build(*crate_name, app_level));
        }
    }

    for (module, level) in &module_levels {
        config_builder =
            config_builder.logger(Logger::builder().appenders(appender_names.clone()).additive(false).build(module, *level));
    }

    let config = config_builder
        .build(Root::builder().appenders(root_appenders).build(root_level))
        .map_err(|err| TssError::ConfigError(format!("logger config: {}", err)))?;
    let _ = log4rs::init_config(config);
    Ok(())
}

/// Initializes logging from the `[logging]` config section.
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    init_logger(config.log_dir.as_deref(), &config.filters)
}

fn rolling_appender(dir: &Path, file_name: &str) -> Result<RollingFileAppender> {
    let archive_pattern = dir.join(format!("{file_name}.{{}}.gz"));
    let archive_pattern = archive_pattern
        .to_str()
        .ok_or_else(|| TssError::ConfigError(format!("log dir is not valid UTF-8: {}", dir.display())))?
        .to_string();
    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(&archive_pattern, LOG_FILE_MAX_ROLLS)
        .map_err(|err| TssError::ConfigError(format!("log roller for {file_name}: {err}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(LOG_FILE_MAX_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_LINE_PATTERN)))
        .build(dir.join(file_name), Box::new(policy))
        .map_err(|err| crate::storage_err!("open log file", err))
}

/// Parsed form of a `filters` string.
#[derive(Debug, PartialEq, Eq)]
struct LogFilters {
    app_level: LevelFilter,
    root_level: Option<LevelFilter>,
    modules: Vec<(String, LevelFilter)>,
}

impl LogFilters {
    fn parse(filters: &str) -> Self {
        let mut parsed = Self { app_level: LevelFilter::Info, root_level: None, modules: Vec::new() };
        let mut app_level = None;
        for part in filters.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            match part.split_once('=') {
                None => {
                    if app_level.is_none() {
                        app_level = part.parse().ok();
                    }
                }
                Some((module, level)) => {
                    let (module, level) = (module.trim(), level.trim());
                    let Ok(level) = level.parse::<LevelFilter>() else { continue };
                    match module {
                        "" => {}
                        "root" => parsed.root_level = parsed.root_level.or(Some(level)),
                        _ => parsed.modules.push((module.to_string(), level)),
                    }
                }
            }
        }
        parsed.app_level = app_level.unwrap_or(LevelFilter::Info);
        parsed
    }
}
