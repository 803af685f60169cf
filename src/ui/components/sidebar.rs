use eframe::egui;

use ease_chat::common::{FriendRef, UserId};

use crate::ui::state::AppState;

#[derive(Default)]
pub struct SidebarActions {
    pub open_friend: Option<FriendRef>,
    pub add_friend: Option<UserId>,
    pub discover: bool,
    pub refresh: bool,
    pub logout: bool,
}

pub fn render(
    ui: &mut egui::Ui,
    state: &AppState,
    username: &str,
    active_friend: Option<UserId>,
) -> SidebarActions {
    let mut actions = SidebarActions::default();

    ui.heading("Friends");
    ui.label(egui::RichText::new(format!("Signed in as {username}")).weak());
    ui.separator();

    if state.friends_loading {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Loading friends...");
        });
    } else if state.friends.is_empty() {
        ui.label("No friends added");
    } else {
        for friend in &state.friends {
            let selected = active_friend == Some(friend.friend_id);
            if ui.selectable_label(selected, &friend.friend_name).clicked() && !selected {
                actions.open_friend = Some(FriendRef::from(friend));
            }
            if let Some(last_message) = &friend.last_message {
                ui.label(egui::RichText::new(last_message).weak());
            }
        }
    }

    if ui.button("Refresh").clicked() {
        actions.refresh = true;
    }

    ui.separator();
    ui.label("Find new friends:");
    if ui.button("Discover").clicked() {
        actions.discover = true;
    }
    for user in &state.potential_friends {
        ui.horizontal(|ui| {
            ui.label(&user.username);
            if ui.button("Add").clicked() {
                actions.add_friend = Some(user.id);
            }
        });
    }

    ui.separator();
    if ui.button("Logout").clicked() {
        actions.logout = true;
    }

    actions
}
