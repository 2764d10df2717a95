//! Turning what the player types into protocol commands.

use shared::Command;

/// Maps a typed line to the command sent to the server.
///
/// A bare number is shorthand for `bid <number>`. Blank lines send nothing;
/// everything else goes to the server as typed so it can answer with the
/// proper error.
pub fn translate_input(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.parse::<i64>().is_ok() {
        return Some(format!("bid {}", line));
    }
    Some(line.to_string())
}

pub fn is_quit(line: &str) -> bool {
    matches!(line.parse::<Command>(), Ok(Command::Quit))
}

/// True for the server line announcing the end of the game.
pub fn is_game_over(line: &str) -> bool {
    line.starts_with("game over:")
}

pub fn join_command(name: &str) -> String {
    Command::Join {
        name: name.trim().to_string(),
    }
    .to_string()
}
