use serenity::{
    all::{ButtonStyle, InputTextStyle},
    builder::{CreateActionRow, CreateButton, CreateInputText, CreateModal},
};

use crate::controller::view::ControlStates;
use crate::player::RepeatMode;

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PREVIOUS: &str = "plc:previous";
    pub const PLAY_PAUSE: &str = "plc:play_pause";
    pub const SKIP: &str = "plc:skip";
    pub const STOP: &str = "plc:stop";
    pub const SHUFFLE: &str = "plc:shuffle";
    pub const REPEAT: &str = "plc:repeat";
    pub const VOLUME_DOWN: &str = "plc:volume_down";
    pub const VOLUME_UP: &str = "plc:volume_up";
    pub const ENQUEUE: &str = "plc:enqueue";
    pub const REFRESH: &str = "plc:refresh";

    pub const ENQUEUE_MODAL: &str = "plc:enqueue_modal";
    pub const ENQUEUE_INPUT: &str = "plc:enqueue_query";

    pub const QUEUE_PAGE_PREFIX: &str = "queue:page:";
}

/// A click on one of the controller buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerAction {
    Previous,
    PlayPause,
    Skip,
    Stop,
    Shuffle,
    Repeat,
    VolumeDown,
    VolumeUp,
    Enqueue,
    Refresh,
}

impl ControllerAction {
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        let action = match custom_id {
            button_ids::PREVIOUS => ControllerAction::Previous,
            button_ids::PLAY_PAUSE => ControllerAction::PlayPause,
            button_ids::SKIP => ControllerAction::Skip,
            button_ids::STOP => ControllerAction::Stop,
            button_ids::SHUFFLE => ControllerAction::Shuffle,
            button_ids::REPEAT => ControllerAction::Repeat,
            button_ids::VOLUME_DOWN => ControllerAction::VolumeDown,
            button_ids::VOLUME_UP => ControllerAction::VolumeUp,
            button_ids::ENQUEUE => ControllerAction::Enqueue,
            button_ids::REFRESH => ControllerAction::Refresh,
            _ => return None,
        };
        Some(action)
    }
}

/// Crea las dos filas de controles del controlador
pub fn create_controller_rows(controls: &ControlStates) -> Vec<CreateActionRow> {
    let play_pause_emoji = if controls.show_resume { '▶' } else { '⏸' };
    let repeat_style = match controls.repeat_mode {
        RepeatMode::Off => ButtonStyle::Secondary,
        _ => ButtonStyle::Success,
    };

    let row1 = CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::PREVIOUS)
            .emoji('⏮')
            .style(ButtonStyle::Secondary)
            .disabled(!controls.previous),
        CreateButton::new(button_ids::PLAY_PAUSE)
            .emoji(play_pause_emoji)
            .style(ButtonStyle::Primary)
            .disabled(!controls.play_pause),
        CreateButton::new(button_ids::SKIP)
            .emoji('⏭')
            .style(ButtonStyle::Secondary)
            .disabled(!controls.skip),
        CreateButton::new(button_ids::STOP)
            .emoji('⏹')
            .style(ButtonStyle::Danger)
            .disabled(!controls.stop),
        CreateButton::new(button_ids::SHUFFLE)
            .emoji('🔀')
            .style(ButtonStyle::Secondary)
            .disabled(!controls.shuffle),
    ]);

    let row2 = CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::REPEAT)
            .emoji(controls.repeat_mode.emoji())
            .style(repeat_style)
            .disabled(!controls.repeat),
        CreateButton::new(button_ids::VOLUME_DOWN)
            .emoji('🔉')
            .style(ButtonStyle::Secondary)
            .disabled(!controls.volume_down),
        CreateButton::new(button_ids::VOLUME_UP)
            .emoji('🔊')
            .style(ButtonStyle::Secondary)
            .disabled(!controls.volume_up),
        CreateButton::new(button_ids::ENQUEUE)
            .label("Agregar")
            .emoji('➕')
            .style(ButtonStyle::Success)
            .disabled(!controls.enqueue),
        CreateButton::new(button_ids::REFRESH)
            .emoji('🔄')
            .style(ButtonStyle::Secondary)
            .disabled(!controls.refresh),
    ]);

    vec![row1, row2]
}

/// Crea controles de paginación para la cola (páginas desde 0)
pub fn create_queue_pagination(page: usize, total_pages: usize) -> CreateActionRow {
    let last = total_pages.saturating_sub(1);

    let prev_btn = CreateButton::new(format!(
        "{}{}",
        button_ids::QUEUE_PAGE_PREFIX,
        page.saturating_sub(1)
    ))
    .emoji('◀')
    .style(ButtonStyle::Primary)
    .disabled(page == 0);

    let next_btn = CreateButton::new(format!(
        "{}{}",
        button_ids::QUEUE_PAGE_PREFIX,
        (page + 1).min(last)
    ))
    .emoji('▶')
    .style(ButtonStyle::Primary)
    .disabled(page >= last);

    CreateActionRow::Buttons(vec![prev_btn, next_btn])
}

pub fn parse_queue_page(custom_id: &str) -> Option<usize> {
    custom_id
        .strip_prefix(button_ids::QUEUE_PAGE_PREFIX)?
        .parse()
        .ok()
}

/// Modal para agregar canciones desde el botón ➕
pub fn create_enqueue_modal() -> CreateModal {
    let input = CreateInputText::new(
        InputTextStyle::Short,
        "Canción o URL",
        button_ids::ENQUEUE_INPUT,
    )
    .placeholder("Hello by Adele")
    .min_length(1)
    .max_length(500)
    .required(true);

    CreateModal::new(button_ids::ENQUEUE_MODAL, "Agregar a la cola")
        .components(vec![CreateActionRow::InputText(input)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerSnapshot;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn disabled_flags(rows: &[CreateActionRow]) -> Vec<bool> {
        let rows = serde_json::to_value(rows).unwrap();
        rows.as_array()
            .unwrap()
            .iter()
            .flat_map(|row| row["components"].as_array().unwrap().clone())
            .map(|button| button["disabled"] == Value::Bool(true))
            .collect()
    }

    #[test]
    fn every_action_round_trips_its_id() {
        for id in [
            button_ids::PREVIOUS,
            button_ids::PLAY_PAUSE,
            button_ids::SKIP,
            button_ids::STOP,
            button_ids::SHUFFLE,
            button_ids::REPEAT,
            button_ids::VOLUME_DOWN,
            button_ids::VOLUME_UP,
            button_ids::ENQUEUE,
            button_ids::REFRESH,
        ] {
            assert!(ControllerAction::from_custom_id(id).is_some(), "{}", id);
        }
        assert_eq!(ControllerAction::from_custom_id("music_skip"), None);
    }

    #[test]
    fn no_player_rows_only_enable_enqueue_and_refresh() {
        let rows = create_controller_rows(&ControlStates::derive(None, 150));

        assert_eq!(
            disabled_flags(&rows),
            vec![true, true, true, true, true, true, true, true, false, false]
        );
    }

    #[test]
    fn idle_player_keeps_repeat_and_volume() {
        let snapshot = PlayerSnapshot {
            volume: 50,
            ..Default::default()
        };
        let rows = create_controller_rows(&ControlStates::derive(Some(&snapshot), 150));

        assert_eq!(
            disabled_flags(&rows),
            vec![true, true, true, true, true, false, false, false, false, false]
        );
    }

    #[test]
    fn queue_page_ids_parse_back() {
        assert_eq!(parse_queue_page("queue:page:3"), Some(3));
        assert_eq!(parse_queue_page("queue:page:x"), None);
        assert_eq!(parse_queue_page("plc:skip"), None);
    }
}
