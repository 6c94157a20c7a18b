//! pokcore: the data model and primitives shared by the update and I/O
//! loops — byte channel, frame codec, resumable-read context, netobj
//! registry, catalogs, map/chunk graph, character and map render
//! contexts, effect engine, and game lock table (spec §2, components
//! 1-11).

pub mod catalog;
pub mod channel;
pub mod character;
pub mod character_context;
pub mod character_render_context;
pub mod chunk;
pub mod codec;
pub mod constants;
pub mod effect;
pub mod error;
pub mod game;
pub mod geometry;
pub mod intermsg;
pub mod keyboard;
pub mod lock_table;
pub mod map;
pub mod map_render_context;
pub mod netobj;
pub mod readinfo;
pub mod tile;
pub mod timeout;
pub mod world;

pub mod logging {
    //! Logger bootstrap, grounded on the teacher's
    //! `core::initialize_logger` (`log4rs` console + optional file
    //! appender with a `ThresholdFilter`).

    use log::LevelFilter;
    use log4rs::append::console::ConsoleAppender;
    use log4rs::append::file::FileAppender;
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;
    use log4rs::filter::threshold::ThresholdFilter;

    /// Initializes the global logger: stderr always, plus an optional
    /// file appender when `log_file` is set. `level` governs both.
    pub fn init(level: LevelFilter, log_file: Option<&str>) -> anyhow::Result<()> {
        let pattern = "{d(%Y-%m-%d %H:%M:%S)} {l} [{T}] {M} - {m}{n}";
        let stderr = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(pattern)))
            .target(log4rs::append::console::Target::Stderr)
            .build();

        let mut builder = Config::builder().appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("stderr", Box::new(stderr)),
        );
        let mut root_appenders = vec!["stderr"];

        if let Some(path) = log_file {
            let file = FileAppender::builder()
                .encoder(Box::new(PatternEncoder::new(pattern)))
                .build(path)?;
            builder = builder.appender(
                Appender::builder()
                    .filter(Box::new(ThresholdFilter::new(level)))
                    .build("file", Box::new(file)),
            );
            root_appenders.push("file");
        }

        let config = builder.build(Root::builder().appenders(root_appenders).build(level))?;
        log4rs::init_config(config)?;
        Ok(())
    }

    /// Maps spec §7's severity policy onto a `log` level: warnings and
    /// unimplemented-feature notices log at `warn`, fatal errors log at
    /// `error` before the owning loop terminates.
    pub fn severity_level(severity: crate::error::Severity) -> log::Level {
        match severity {
            crate::error::Severity::Warning => log::Level::Warn,
            crate::error::Severity::Unimplemented => log::Level::Warn,
            crate::error::Severity::Fatal => log::Level::Error,
        }
    }
}
