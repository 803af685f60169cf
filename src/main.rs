mod ui;

use std::error::Error;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::runtime::Handle;

use ease_chat::common::UserId;
use ease_chat::config::{self, AppConfig};
use ease_chat::conversation::ConversationController;
use ease_chat::network::{HttpApi, TransportChannel};
use ease_chat::session::SessionContext;
use ease_chat::storage::{self, SessionDatabase};
use ui::ChatApp;

#[derive(Parser)]
#[command(name = "ease_chat", version, about = "Real-time two-party chat client")]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and log in
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the saved session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List friends
    Friends,
    /// List users that can be added as friends
    Discover,
    /// Add a user as a friend
    AddFriend { friend_id: UserId },
    /// Open the chat window (default)
    Chat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config).with_env_overrides();

    storage::ensure_data_dir(&app_config.db_path)?;
    let session_db = SessionDatabase::open(&app_config.db_path)?;
    let session = SessionContext::restore(&session_db)?;
    let api = HttpApi::new(&app_config.api_url, session.clone())?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Signup {
            username,
            email,
            password,
        } => {
            let new_session = api.signup(&username, &email, &password).await?;
            session_db.save_session(&new_session)?;
            println!("Welcome to EASE {}", new_session.username.to_uppercase());
        }
        Command::Login { email, password } => {
            let new_session = api.login(&email, &password).await?;
            session_db.save_session(&new_session)?;
            println!("Logged in as {}", new_session.username);
        }
        Command::Logout => {
            session_db.clear_session()?;
            session.logout();
            println!("You have been logged out");
        }
        Command::Whoami => match session.current() {
            Some(current) => {
                let since = session_db
                    .logged_in_at()?
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                    .map(|at| format!(", logged in since {}", at.format("%Y-%m-%d %H:%M UTC")))
                    .unwrap_or_default();
                println!("{} (id {}){since}", current.username, current.user_id);
            }
            None => println!("Not logged in"),
        },
        Command::Friends => {
            let friends = api.friends().await?;
            if friends.is_empty() {
                println!("No friends yet; try `ease_chat discover`");
            }
            for friend in friends {
                let last = friend.last_message.unwrap_or_default();
                println!("{:>6}  {:<20} {last}", friend.friend_id, friend.friend_name);
            }
        }
        Command::Discover => {
            for user in api.potential_friends().await? {
                println!("{:>6}  {}", user.id, user.username);
            }
        }
        Command::AddFriend { friend_id } => {
            api.add_friend(friend_id).await?;
            println!("Added friend {friend_id}");
        }
        Command::Chat => {
            if !session.is_logged_in() {
                return Err("not logged in; run `ease_chat login` first".into());
            }
            run_chat_window(&app_config, session, session_db, api)?;
        }
    }

    Ok(())
}

fn run_chat_window(
    app_config: &AppConfig,
    session: SessionContext,
    session_db: SessionDatabase,
    api: HttpApi,
) -> Result<(), eframe::Error> {
    // 1. Một kết nối socket dùng chung cho cả tiến trình
    let channel = TransportChannel::connect(session.clone(), &app_config.socket_url);

    // 2. Controller cho khung chat
    let runtime = Handle::current();
    let controller = ConversationController::new(
        session.clone(),
        channel,
        Arc::new(api.clone()),
        runtime.clone(),
    );

    // 3. Khởi chạy UI (Chạy trên Main Thread)
    let options = eframe::NativeOptions::default();
    let mut parts = Some((controller, api, session, session_db, runtime));

    eframe::run_native(
        "EASE Chat",
        options,
        Box::new(move |cc| {
            let (controller, api, session, session_db, runtime) = parts
                .take()
                .expect("ChatApp should only be initialized once");

            log::info!("Chat window started");

            Ok(Box::new(ChatApp::new(
                cc, controller, api, session, session_db, runtime,
            )))
        }),
    )
}
