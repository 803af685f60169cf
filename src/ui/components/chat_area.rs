use eframe::egui;

use ease_chat::common::Direction;
use ease_chat::conversation::ConversationView;

pub fn render(ui: &mut egui::Ui, view: ConversationView<'_>, friend_name: &str) {
    egui::ScrollArea::vertical()
        .auto_shrink([false; 2])
        .stick_to_bottom(true)
        .show(ui, |ui| match view {
            ConversationView::Loading => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading messages...");
                });
            }
            ConversationView::Empty => {
                ui.vertical_centered(|ui| {
                    ui.label(egui::RichText::new("Let's start the conversation").strong());
                });
            }
            ConversationView::Messages(messages) => {
                for message in messages {
                    let (author, layout) = match message.direction {
                        Direction::Sent => (
                            "YOU".to_string(),
                            egui::Layout::right_to_left(egui::Align::TOP),
                        ),
                        Direction::Received => (
                            friend_name.to_uppercase(),
                            egui::Layout::left_to_right(egui::Align::TOP),
                        ),
                    };
                    ui.with_layout(layout, |ui| {
                        ui.label(format!("{author}: {}", message.content));
                    });
                }
            }
        });
}
