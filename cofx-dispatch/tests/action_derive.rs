//! Tests for #[derive(Action)] macro

use cofx_dispatch::Action as ActionMacro;
use cofx_dispatch::{Action, Msg};

#[test]
fn test_variant_names() {
    #[derive(ActionMacro, Clone, Debug)]
    enum Plain {
        Increment,
        Set(i32),
        Move { x: i32, y: i32 },
    }

    assert_eq!(Plain::Increment.name(), "Increment");
    assert_eq!(Plain::Set(1).name(), "Set");
    assert_eq!(Plain::Move { x: 0, y: 0 }.name(), "Move");
}

#[test]
fn test_prefix_and_rename() {
    #[derive(ActionMacro, Clone, Debug)]
    #[action(prefix = "todo/")]
    enum Todo {
        Add(String),
        #[action(rename = "CLEAR")]
        RemoveAll,
    }

    assert_eq!(Todo::Add("milk".into()).name(), "todo/Add");
    assert_eq!(Todo::RemoveAll.name(), "todo/CLEAR");
}

#[test]
fn test_rename_all() {
    #[derive(ActionMacro, Clone, Debug)]
    #[action(rename_all = "SCREAMING_SNAKE_CASE")]
    enum Screaming {
        AddTodo,
        Loaded(Vec<String>),
    }

    #[derive(ActionMacro, Clone, Debug)]
    #[action(prefix = "user.", rename_all = "snake_case")]
    enum Snake {
        LoggedIn,
    }

    assert_eq!(Screaming::AddTodo.name(), "ADD_TODO");
    assert_eq!(Screaming::Loaded(vec![]).name(), "LOADED");
    assert_eq!(Snake::LoggedIn.name(), "user.logged_in");
}

#[test]
fn test_msg_uses_derived_name() {
    #[derive(ActionMacro, Clone, Debug, PartialEq)]
    #[action(prefix = "todo/")]
    enum Todo {
        Add(String),
    }

    let msg: Msg<Todo> = Todo::Add("milk".into()).into();
    assert_eq!(msg.name(), "todo/Add");
    assert_eq!(msg.into_action(), Some(Todo::Add("milk".into())));
}
