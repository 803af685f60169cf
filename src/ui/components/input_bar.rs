use eframe::egui;

#[derive(Default)]
pub struct InputActions {
    /// The text changed this frame (the user is typing).
    pub changed: bool,
    pub submitted: Option<String>,
}

/// `enabled` is false while the conversation history is still loading.
pub fn render(ui: &mut egui::Ui, input_text: &mut String, enabled: bool) -> InputActions {
    let mut actions = InputActions::default();
    let mut send = false;
    let hint = if enabled {
        "Type your message"
    } else {
        "Loading messages..."
    };
    ui.horizontal(|ui| {
        let response = ui.add_enabled(
            enabled,
            egui::TextEdit::singleline(input_text).hint_text(hint),
        );
        actions.changed = response.changed();
        if ui.add_enabled(enabled, egui::Button::new("Send")).clicked() {
            send = true;
        }

        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            send = true;
        }
    });

    if enabled && send && !input_text.is_empty() {
        actions.submitted = Some(input_text.clone());
        input_text.clear();
    }

    actions
}
