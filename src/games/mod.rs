//! Built-in game definitions, selectable by name from the command line.

pub mod cookie;

use crate::game::definition::GameDefinition;

pub struct BuiltinGame {
    pub name: &'static str,
    pub description: &'static str,
    pub define: fn() -> GameDefinition,
}

pub fn builtin_games() -> Vec<BuiltinGame> {
    vec![BuiltinGame {
        name: "cookie",
        description: "Cookie clicker: cursors, grandmas, farms, two upgrades and a prestige layer",
        define: cookie::define_game,
    }]
}

/// Looks a built-in game up by name, case-insensitively.
pub fn find_builtin(name: &str) -> Option<GameDefinition> {
    builtin_games()
        .into_iter()
        .find(|g| g.name.eq_ignore_ascii_case(name))
        .map(|g| (g.define)())
}
