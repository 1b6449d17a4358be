use std::{sync::Arc, time::SystemTime};

use kura::*;

// Define regular structs

struct Logger {
    prefix: String,
}

impl Logger {
    fn log(&self, content: &str) {
        println!("{}{}", self.prefix, content);
    }
}

struct DateLogger {
    logger: Arc<Logger>,
}

impl DateLogger {
    fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    fn log_date(&self) {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        self.logger.log(&format!("{}s since epoch", now.as_secs()));
    }
}

// Describe how the container can build them

fn catalog() -> Catalog {
    Catalog::new()
        .with_interface("Log")
        .with_class(
            Class::new("Logger", |prefix: String| Logger { prefix })
                .param(Parameter::builtin("prefix").with_default("")),
        )
        .with_class(
            Class::new("DateLogger", DateLogger::new).param(Parameter::class("logger", "Log")),
        )
}

// Supply the logger lazily, on first use

struct LogProvider;

impl Provider for LogProvider {
    fn provides(&self, name: &str) -> bool {
        name == "Log"
    }

    fn register(&self, container: &Container) {
        container
            .add("Logger", true, Binding::Empty)
            .with_argument("prefix", "[demo] ");
        container.add("Log", true, "Logger");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let container = Container::new(catalog());
    container.provider(LogProvider);

    let date_logger: Arc<DateLogger> = container.get_as("DateLogger")?;
    date_logger.log_date();

    let logger: Arc<Logger> = container.get_as("Log")?;
    assert!(Arc::ptr_eq(&logger, &date_logger.logger));

    let greeting = Function::closure(
        [Parameter::class("log", "Log"), Parameter::builtin("name")],
        |log: Arc<Logger>, name: String| log.log(&format!("Hello {name}")),
    );
    container.call(greeting, arguments! { "name" => "world" })?;

    Ok(())
}
