use std::sync::Arc;

use chrono::Utc;

use slotwise_agent::runtime::{RuntimeConfig, SchedulerRuntime};
use slotwise_core::config::{AppConfig, LoadOptions};
use slotwise_core::StaticCalendarBackend;
use slotwise_db::InMemorySessionStore;

use crate::commands::{build_runtime, CommandResult};

pub fn run(duration: i64, preference: Option<&str>) -> CommandResult {
    if duration <= 0 {
        return CommandResult::failure(
            "slots",
            "invalid_argument",
            "--duration must be a positive number of minutes",
            2,
        );
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "slots",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime_config = match RuntimeConfig::from_app(&config) {
        Ok(runtime_config) => runtime_config,
        Err(error) => {
            return CommandResult::failure("slots", "config_validation", error.to_string(), 2);
        }
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(message) => return CommandResult::failure("slots", "runtime_init", message, 3),
    };

    runtime.block_on(async move {
        let now = Utc::now();
        let calendar =
            Arc::new(StaticCalendarBackend::weekday_fixture(now, 14, runtime_config.tz));
        let scheduler =
            SchedulerRuntime::new(runtime_config, calendar, Arc::new(InMemorySessionStore::default()));

        let options = scheduler.one_shot_slots(duration, preference, now).await;
        if options.is_empty() {
            return CommandResult::success(
                "slots",
                "no available slots matched the request; try a different time or duration",
            );
        }

        let mut output = String::from("available slots:\n");
        for (index, option) in options.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", index + 1, option.label));
        }
        CommandResult { exit_code: 0, output }
    })
}
