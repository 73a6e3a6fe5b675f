//! Keyboard shortcuts.
//!
//! [`dispatch`] decides what a key press
//! means for the current store state
//! without touching it; [`apply`]
//! performs the decision. [`handle_key`]
//! does both. Chords can be written as
//! text (`ctrl+k`, `esc`, `j`,
//! `input:esc`) so sequences can be
//! replayed from the command line.

use std::fmt;
use std::str::FromStr;

use anyhow::{
  anyhow,
  bail
};
use tracing::{
  debug,
  trace
};

use crate::store::{
  Direction,
  TaskStore
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
  Char(char),
  Escape,
  Enter,
  Named(String)
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default
)]
pub struct Modifiers {
  pub ctrl:  bool,
  pub meta:  bool,
  pub alt:   bool,
  pub shift: bool
}

impl Modifiers {
  /// Ctrl on most platforms, Cmd on
  /// macOS.
  pub fn is_mod(self) -> bool {
    self.ctrl || self.meta
  }
}

/// Where keyboard focus was when the key
/// was pressed.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default
)]
pub enum FocusTarget {
  #[default]
  Document,
  TextInput,
  TextArea,
  ContentEditable
}

impl FocusTarget {
  pub fn is_editable(self) -> bool {
    !matches!(self, FocusTarget::Document)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
  pub key:       Key,
  pub modifiers: Modifiers,
  pub target:    FocusTarget
}

impl KeyInput {
  pub fn new(key: Key) -> Self {
    Self {
      key,
      modifiers: Modifiers::default(),
      target: FocusTarget::Document
    }
  }

  pub fn with_modifiers(
    mut self,
    modifiers: Modifiers
  ) -> Self {
    self.modifiers = modifiers;
    self
  }

  pub fn in_target(
    mut self,
    target: FocusTarget
  ) -> Self {
    self.target = target;
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
  /// Close the edit and the creation
  /// dialogs, whichever are open.
  CloseDialogs,
  ToggleCommand,
  CloseCommand,
  ExitFocus,
  CloseEdit,
  CloseCreate,
  Move(Direction),
  Edit(String),
  ToggleFocus(String),
  Create
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Default
)]
pub struct Dispatch {
  pub action:          Option<KeyAction>,
  pub prevent_default: bool
}

impl Dispatch {
  fn ignored() -> Self {
    Self::default()
  }

  fn handled(
    action: Option<KeyAction>
  ) -> Self {
    Self {
      action,
      prevent_default: false
    }
  }

  fn consumed(
    action: Option<KeyAction>
  ) -> Self {
    Self {
      action,
      prevent_default: true
    }
  }
}

pub fn dispatch(
  store: &TaskStore,
  input: &KeyInput
) -> Dispatch {
  let is_escape = input.key == Key::Escape;

  if input.target.is_editable() {
    if is_escape
      && (store.is_editing()
        || store.is_creating())
    {
      return Dispatch::handled(Some(
        KeyAction::CloseDialogs
      ));
    }
    return Dispatch::ignored();
  }

  if input.modifiers.is_mod()
    && matches!(
      input.key,
      Key::Char(c) if c.eq_ignore_ascii_case(&'k')
    )
  {
    return Dispatch::consumed(Some(
      KeyAction::ToggleCommand
    ));
  }

  if is_escape {
    let action = if store.is_command_open()
    {
      Some(KeyAction::CloseCommand)
    } else if store.is_focus_mode() {
      Some(KeyAction::ExitFocus)
    } else if store.is_editing() {
      Some(KeyAction::CloseEdit)
    } else if store.is_creating() {
      Some(KeyAction::CloseCreate)
    } else {
      None
    };
    return Dispatch::handled(action);
  }

  if store.is_command_open()
    || store.is_editing()
    || store.is_creating()
  {
    return Dispatch::ignored();
  }

  let Key::Char(c) = input.key else {
    return Dispatch::ignored();
  };
  let selected = store
    .selected_task_id()
    .map(str::to_string);
  match c.to_ascii_lowercase() {
    | 'j' => {
      Dispatch::consumed(Some(
        KeyAction::Move(Direction::Down)
      ))
    }
    | 'k' => {
      Dispatch::consumed(Some(
        KeyAction::Move(Direction::Up)
      ))
    }
    | 'e' => {
      Dispatch::consumed(
        selected.map(KeyAction::Edit)
      )
    }
    | 'f' => {
      Dispatch::consumed(
        selected.map(KeyAction::ToggleFocus)
      )
    }
    | 'n' => {
      Dispatch::consumed(Some(
        KeyAction::Create
      ))
    }
    // Completion is toggled by the list
    // itself.
    | 'x' => Dispatch::ignored(),
    | _ => Dispatch::ignored()
  }
}

pub fn apply(
  store: &mut TaskStore,
  action: &KeyAction
) {
  debug!(?action, "key action");
  match action {
    | KeyAction::CloseDialogs => {
      store.set_editing(None);
      store.set_creating(false);
    }
    | KeyAction::ToggleCommand => {
      store.toggle_command_open()
    }
    | KeyAction::CloseCommand => {
      store.set_command_open(false)
    }
    | KeyAction::ExitFocus => {
      store.toggle_focus_mode(None)
    }
    | KeyAction::CloseEdit => {
      store.set_editing(None)
    }
    | KeyAction::CloseCreate => {
      store.set_creating(false)
    }
    | KeyAction::Move(direction) => {
      store.move_selection(*direction)
    }
    | KeyAction::Edit(id) => {
      store.set_editing(Some(id))
    }
    | KeyAction::ToggleFocus(id) => {
      store.toggle_focus_mode(Some(id))
    }
    | KeyAction::Create => {
      store.set_creating(true)
    }
  }
}

pub fn handle_key(
  store: &mut TaskStore,
  input: &KeyInput
) -> Dispatch {
  let result = dispatch(store, input);
  trace!(
    ?input,
    ?result,
    "key dispatched"
  );
  if let Some(action) = &result.action {
    apply(store, action);
  }
  result
}

impl fmt::Display for KeyInput {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self.target {
      | FocusTarget::Document => {}
      | FocusTarget::TextInput => {
        f.write_str("input:")?
      }
      | FocusTarget::TextArea => {
        f.write_str("textarea:")?
      }
      | FocusTarget::ContentEditable => {
        f.write_str("editable:")?
      }
    }
    let m = self.modifiers;
    for (on, name) in [
      (m.ctrl, "ctrl+"),
      (m.meta, "meta+"),
      (m.alt, "alt+"),
      (m.shift, "shift+")
    ] {
      if on {
        f.write_str(name)?;
      }
    }
    match &self.key {
      | Key::Char(c) => write!(f, "{c}"),
      | Key::Escape => f.write_str("esc"),
      | Key::Enter => f.write_str("enter"),
      | Key::Named(name) => f.write_str(name)
    }
  }
}

impl FromStr for KeyInput {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let raw = s.trim();
    if raw.is_empty() {
      bail!("empty key chord");
    }

    let (target, chord) =
      match raw.split_once(':') {
        | Some((prefix, rest)) => {
          let target = match prefix
            .to_ascii_lowercase()
            .as_str()
          {
            | "input" => {
              FocusTarget::TextInput
            }
            | "textarea" => {
              FocusTarget::TextArea
            }
            | "editable" => {
              FocusTarget::ContentEditable
            }
            | "doc" | "document" => {
              FocusTarget::Document
            }
            | other => {
              bail!(
                "unknown focus target in \
                 {raw:?}: {other}"
              )
            }
          };
          (target, rest)
        }
        | None => {
          (FocusTarget::Document, raw)
        }
      };

    let mut parts: Vec<&str> =
      chord.split('+').collect();
    // A trailing "+" means the plus key
    // itself.
    if chord.ends_with("++") || chord == "+"
    {
      parts.retain(|p| !p.is_empty());
      parts.push("+");
    }
    let key_part = parts
      .pop()
      .filter(|p| !p.is_empty())
      .ok_or_else(|| {
        anyhow!(
          "missing key in chord {raw:?}"
        )
      })?;

    let mut modifiers = Modifiers::default();
    for part in parts {
      match part.to_ascii_lowercase().as_str()
      {
        | "ctrl" | "control" => {
          modifiers.ctrl = true
        }
        | "meta" | "cmd" | "super" => {
          modifiers.meta = true
        }
        | "mod" => {
          if cfg!(target_os = "macos") {
            modifiers.meta = true;
          } else {
            modifiers.ctrl = true;
          }
        }
        | "alt" | "option" => {
          modifiers.alt = true
        }
        | "shift" => modifiers.shift = true,
        | other => {
          bail!(
            "unknown modifier in {raw:?}: \
             {other}"
          )
        }
      }
    }

    let key = match key_part
      .to_ascii_lowercase()
      .as_str()
    {
      | "esc" | "escape" => Key::Escape,
      | "enter" | "return" => Key::Enter,
      | _ => {
        let mut chars = key_part.chars();
        match (chars.next(), chars.next()) {
          | (Some(c), None) => Key::Char(c),
          | _ => {
            Key::Named(
              key_part.to_ascii_lowercase()
            )
          }
        }
      }
    };

    Ok(
      KeyInput::new(key)
        .with_modifiers(modifiers)
        .in_target(target)
    )
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };
  use focusboard_shared::Task;
  use pretty_assertions::assert_eq;

  use super::*;

  fn store_with(ids: &[&str]) -> TaskStore {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .unwrap();
    let mut store = TaskStore::default();
    store.set_tasks(
      ids
        .iter()
        .map(|id| Task::new(*id, *id, now))
        .collect()
    );
    store
  }

  fn key(chord: &str) -> KeyInput {
    chord.parse().unwrap()
  }

  #[test]
  fn parses_chords() {
    assert_eq!(
      key("ctrl+k"),
      KeyInput::new(Key::Char('k'))
        .with_modifiers(Modifiers {
          ctrl: true,
          ..Modifiers::default()
        })
    );
    assert_eq!(key("Esc").key, Key::Escape);
    assert!(key("meta+K").modifiers.meta);
    assert_eq!(
      key("pagedown").key,
      Key::Named("pagedown".into())
    );
    assert!(
      "hyper+k".parse::<KeyInput>().is_err()
    );
    assert!("".parse::<KeyInput>().is_err());
    assert_eq!(
      key("ctrl+k").to_string(),
      "ctrl+k"
    );
  }

  #[test]
  fn focus_target_prefixes_round_trip() {
    let escape_in_input =
      KeyInput::new(Key::Escape)
        .in_target(FocusTarget::TextInput);
    assert_eq!(key("input:esc"), escape_in_input);
    assert_eq!(
      escape_in_input.to_string(),
      "input:esc"
    );
    assert_eq!(
      key("editable:shift+j"),
      KeyInput::new(Key::Char('j'))
        .with_modifiers(Modifiers {
          shift: true,
          ..Modifiers::default()
        })
        .in_target(
          FocusTarget::ContentEditable
        )
    );
    assert_eq!(
      key("doc:n").target,
      FocusTarget::Document
    );
    assert!(
      "window:n".parse::<KeyInput>().is_err()
    );
  }

  #[test]
  fn mod_k_toggles_palette_even_over_modals()
  {
    let mut store = store_with(&["a"]);
    store.set_creating(true);
    let result =
      handle_key(&mut store, &key("ctrl+k"));
    assert!(result.prevent_default);
    assert!(store.is_command_open());
    handle_key(&mut store, &key("meta+k"));
    assert!(!store.is_command_open());
  }

  #[test]
  fn escape_closes_one_layer_at_a_time() {
    let mut store = store_with(&["a"]);
    store.set_command_open(true);
    store.toggle_focus_mode(Some("a"));
    store.set_editing(Some("a"));
    store.set_creating(true);

    handle_key(&mut store, &key("esc"));
    assert!(!store.is_command_open());
    assert!(store.is_focus_mode());

    handle_key(&mut store, &key("esc"));
    assert!(!store.is_focus_mode());
    assert!(store.is_editing());

    handle_key(&mut store, &key("esc"));
    assert!(!store.is_editing());
    assert!(store.is_creating());

    handle_key(&mut store, &key("esc"));
    assert!(!store.is_creating());

    assert_eq!(
      handle_key(&mut store, &key("esc")),
      Dispatch::default()
    );
  }

  #[test]
  fn text_inputs_only_react_to_escape() {
    let mut store = store_with(&["a", "b"]);
    store.set_editing(Some("a"));
    store.set_creating(true);

    let result =
      handle_key(&mut store, &key("input:j"));
    assert_eq!(result, Dispatch::default());
    assert_eq!(store.selected_index(), 0);

    let result = handle_key(
      &mut store,
      &key("textarea:ctrl+k")
    );
    assert_eq!(result.action, None);
    assert!(!store.is_command_open());

    handle_key(
      &mut store,
      &key("editable:esc")
    );
    assert!(!store.is_editing());
    assert!(!store.is_creating());
  }

  #[test]
  fn navigation_is_case_insensitive() {
    let mut store =
      store_with(&["a", "b", "c"]);
    handle_key(&mut store, &key("J"));
    handle_key(&mut store, &key("j"));
    assert_eq!(
      store.selected_task_id(),
      Some("c")
    );
    let result =
      handle_key(&mut store, &key("k"));
    assert_eq!(
      result.action,
      Some(KeyAction::Move(Direction::Up))
    );
    assert_eq!(
      store.selected_task_id(),
      Some("b")
    );
  }

  #[test]
  fn edit_and_focus_need_a_selection() {
    let mut store = store_with(&["a"]);
    let result =
      handle_key(&mut store, &key("e"));
    assert!(result.prevent_default);
    assert_eq!(result.action, None);

    store.set_selected_task_id(Some("a"));
    handle_key(&mut store, &key("f"));
    assert_eq!(
      store.focused_task_id(),
      Some("a")
    );
    handle_key(&mut store, &key("e"));
    assert_eq!(
      store.editing_task_id(),
      Some("a")
    );
  }

  #[test]
  fn modals_block_navigation_and_x_is_unhandled()
  {
    let mut store = store_with(&["a", "b"]);
    assert_eq!(
      handle_key(&mut store, &key("x")),
      Dispatch::default()
    );

    handle_key(&mut store, &key("n"));
    assert!(store.is_creating());
    assert_eq!(
      handle_key(&mut store, &key("j"))
        .action,
      None
    );
    assert_eq!(store.selected_index(), 0);
  }
}
