use std::io::{BufRead, Write};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use slotwise_agent::runtime::{RuntimeConfig, SchedulerRuntime};
use slotwise_core::config::{AppConfig, CalendarProvider, LoadOptions};
use slotwise_core::{ConversationState, SessionStore, StaticCalendarBackend};
use slotwise_db::{connect_with_settings, migrations, InMemorySessionStore, SqlSessionRepository};

use crate::commands::{build_runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    if config.calendar.provider == CalendarProvider::Google {
        return CommandResult::failure(
            "chat",
            "calendar_provider",
            "the google calendar bridge runs outside this CLI; set calendar.provider = \
             \"fixture\" to chat against the built-in demo calendar",
            2,
        );
    }

    let runtime_config = match RuntimeConfig::from_app(&config) {
        Ok(runtime_config) => runtime_config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), 2);
        }
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(message) => return CommandResult::failure("chat", "runtime_init", message, 3),
    };

    runtime.block_on(async move {
        let store: Arc<dyn SessionStore> = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => match migrations::run_pending(&pool).await {
                Ok(()) => Arc::new(SqlSessionRepository::new(pool)),
                Err(error) => {
                    println!("(sessions are not persisted: migrations failed: {error})");
                    Arc::new(InMemorySessionStore::default())
                }
            },
            Err(error) => {
                println!("(sessions are not persisted: database unavailable: {error})");
                Arc::new(InMemorySessionStore::default())
            }
        };

        let now = Utc::now();
        let calendar =
            Arc::new(StaticCalendarBackend::weekday_fixture(now, 14, runtime_config.tz));
        let scheduler = SchedulerRuntime::new(runtime_config, calendar, store);

        let session_id = Uuid::new_v4().to_string();
        match scheduler.start_session(&session_id, "cli_user", now).await {
            Ok(welcome) => println!("{}", welcome.reply),
            Err(error) => {
                return CommandResult::failure("chat", "session_store", error.to_string(), 4);
            }
        }

        let stdin = std::io::stdin();
        let mut input = String::new();
        loop {
            print!("> ");
            let _ = std::io::stdout().flush();

            input.clear();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => break,
                Ok(_) => {}
                Err(error) => {
                    return CommandResult::failure("chat", "stdin", error.to_string(), 4);
                }
            }

            let line = input.trim();
            if matches!(line, "quit" | "exit" | "bye") {
                break;
            }

            let response = scheduler.handle_turn(&session_id, line, Utc::now()).await;
            println!("{}", response.reply);

            if response.state == ConversationState::Completed {
                break;
            }
        }

        CommandResult::success("chat", format!("conversation {session_id} ended"))
    })
}
