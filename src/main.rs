use std::sync::Arc;

use teloxide::{prelude::*, utils::command::BotCommands};

mod bot_state;
mod config;
mod database;
mod dialogue;
mod handlers;
mod models;
mod notify;
mod reservation;
mod scheduler;
mod sessions;
mod templates;

use crate::bot_state::BotState;
use crate::config::Config;
use crate::database::Database;
use crate::handlers::{callback_handler, command_handler, message_handler};
use crate::notify::{Notifier, TelegramNotifier};
use crate::templates::Templates;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "начать работу с ботом")]
    Start,
    #[command(description = "показать помощь")]
    Help,
    #[command(description = "частые вопросы")]
    Faq,
    #[command(description = "записаться на фотосессию")]
    Book,
    #[command(description = "моя запись")]
    MyBooking,
    #[command(description = "оставить отзыв")]
    Feedback,
    #[command(description = "выбрать язык")]
    Language,
    #[command(description = "панель администратора")]
    Admin,
    #[command(description = "отменить текущее действие")]
    Cancel,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting photo session booking bot...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            return Err(Box::new(e) as Box<dyn std::error::Error + Send + Sync>);
        }
    };

    let db = Database::new(&config.database_url).await?;
    db.init().await?;
    log::info!("Database initialized");

    let templates = Templates::load(&config.templates_path);

    let bot = Bot::from_env();
    let state = BotState::new(db, config, templates);

    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone()));
    tokio::spawn(scheduler::reminder_task(
        state.db.clone(),
        notifier,
        state.templates.clone(),
        state.config.admin_ids.clone(),
    ));
    tokio::spawn(scheduler::session_cleanup_task(
        state.admin_sessions.clone(),
        state.config.session_timeout(),
    ));

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler));

    log::info!("Starting dispatcher...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
