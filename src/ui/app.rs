use eframe::egui;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use ease_chat::common::{FriendRef, UserId};
use ease_chat::conversation::{ControllerUpdate, ConversationController};
use ease_chat::network::HttpApi;
use ease_chat::session::SessionContext;
use ease_chat::storage::SessionDatabase;

use super::components::{
    chat_area, input_bar,
    sidebar::{self, SidebarActions},
};
use super::state::{AppState, DirectoryEvent};

pub struct ChatApp {
    state: AppState,
    controller: ConversationController,
    api: HttpApi,
    session: SessionContext,
    session_db: SessionDatabase,
    runtime: Handle,
    directory_sender: mpsc::Sender<DirectoryEvent>,
    directory_receiver: mpsc::Receiver<DirectoryEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        controller: ConversationController,
        api: HttpApi,
        session: SessionContext,
        session_db: SessionDatabase,
        runtime: Handle,
    ) -> Self {
        let (directory_sender, directory_receiver) = mpsc::channel(100);
        let mut app = Self {
            state: AppState::new(),
            controller,
            api,
            session,
            session_db,
            runtime,
            directory_sender,
            directory_receiver,
        };
        app.refresh_friends();
        app
    }

    fn handle_directory_events(&mut self) {
        while let Ok(event) = self.directory_receiver.try_recv() {
            self.state.apply(event);
        }
    }

    fn handle_conversation_updates(&mut self) {
        for update in self.controller.pump() {
            if let ControllerUpdate::Notice(text) = update {
                self.state.show_notice(text);
            }
        }
    }

    fn refresh_friends(&mut self) {
        let api = self.api.clone();
        let sender = self.directory_sender.clone();
        self.runtime.spawn(async move {
            let event = match api.friends().await {
                Ok(friends) => DirectoryEvent::Friends(friends),
                Err(err) => {
                    log::warn!("Failed to fetch friends: {err}");
                    DirectoryEvent::Failed("Oops! There was some problem fetching friends".into())
                }
            };
            if let Err(err) = sender.send(event).await {
                log::warn!("Failed to deliver friend list to UI: {err}");
            }
        });
    }

    fn discover(&mut self) {
        let api = self.api.clone();
        let sender = self.directory_sender.clone();
        self.runtime.spawn(async move {
            let event = match api.potential_friends().await {
                Ok(users) => DirectoryEvent::Discovered(users),
                Err(err) => {
                    log::warn!("Failed to fetch potential friends: {err}");
                    DirectoryEvent::Failed("Oops! There was some problem fetching friends".into())
                }
            };
            let _ = sender.send(event).await;
        });
    }

    fn add_friend(&mut self, friend_id: UserId) {
        let api = self.api.clone();
        let sender = self.directory_sender.clone();
        self.runtime.spawn(async move {
            match api.add_friend(friend_id).await {
                Ok(()) => {
                    let _ = sender.send(DirectoryEvent::FriendAdded(friend_id)).await;
                    if let Ok(friends) = api.friends().await {
                        let _ = sender.send(DirectoryEvent::Friends(friends)).await;
                    }
                }
                Err(err) => {
                    log::warn!("Failed to add friend {friend_id}: {err}");
                    let _ = sender
                        .send(DirectoryEvent::Failed(
                            "Failed to make friend, try again".into(),
                        ))
                        .await;
                }
            }
        });
    }

    fn open_friend(&mut self, friend: FriendRef) {
        self.state.input_text.clear();
        if let Err(err) = self.controller.open(friend) {
            log::warn!("Cannot open conversation: {err}");
            self.state.show_notice("Please log in again");
        }
    }

    fn logout(&mut self, ctx: &egui::Context) {
        self.controller.close();
        if let Err(err) = self.session_db.clear_session() {
            log::error!("Failed to clear saved session: {err}");
        }
        self.session.logout();
        log::info!("Logged out");
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn handle_sidebar(&mut self, ctx: &egui::Context, actions: SidebarActions) {
        if let Some(friend) = actions.open_friend {
            self.open_friend(friend);
        }
        if let Some(friend_id) = actions.add_friend {
            self.add_friend(friend_id);
        }
        if actions.discover {
            self.discover();
        }
        if actions.refresh {
            self.refresh_friends();
        }
        if actions.logout {
            self.logout(ctx);
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_directory_events();
        self.handle_conversation_updates();

        let username = self.session.username().unwrap_or_default();
        let active_friend = self.controller.active_friend().map(|friend| friend.id);
        let actions = egui::SidePanel::left("friends_sidebar")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| sidebar::render(ui, &self.state, &username, active_friend))
            .inner;
        self.handle_sidebar(ctx, actions);

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(friend) = self.controller.active_friend().cloned() else {
                ui.vertical_centered(|ui| {
                    ui.heading("WELCOME TO EASE");
                    ui.label("Pick a friend to start chatting");
                });
                return;
            };

            ui.heading(&friend.name);
            ui.label(if self.controller.is_typing() {
                "Typing..."
            } else {
                "Online"
            });
            ui.separator();

            if let Some(notice) = self.state.active_notice() {
                ui.colored_label(egui::Color32::from_rgb(227, 109, 62), notice);
            }

            let input_height = 36.0;
            ui.allocate_ui(
                egui::vec2(ui.available_width(), ui.available_height() - input_height),
                |ui| {
                    if let Some(view) = self.controller.view() {
                        chat_area::render(ui, view, &friend.name);
                    }
                },
            );

            ui.separator();
            let input = input_bar::render(
                ui,
                &mut self.state.input_text,
                self.controller.accepts_input(),
            );
            if input.changed {
                self.controller.notify_typing();
            }
            if let Some(content) = input.submitted {
                self.controller.submit(&content);
            }
        });

        ctx.request_repaint();
    }
}
