use crate::session::{FocusChange, SessionCommand};

pub const HELP: &str = "\
commands:
  p              play / pause
  play, pause    explicit transport
  n, b           next / previous track
  s <sec>        seek to position
  r              toggle repeat-one
  stop           pause and go idle
  sel <n>        load track number n from `ls`
  focus <gain|loss|transient|duck>
  refresh        reload the playlist from the catalog
  ls             list tracks
  st             show status
  h              this help
  q              quit";

#[derive(Debug)]
pub enum Input {
    Session(SessionCommand),
    ToggleRepeat,
    /// Zero-based index into the listed tracks.
    Select(usize),
    ListTracks,
    Status,
    Help,
    Quit,
}

pub fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Input::Status);
    };
    let arg = words.next();

    let input = match (command, arg) {
        ("p", None) => Input::Session(SessionCommand::PlayPause),
        ("play", None) => Input::Session(SessionCommand::Play),
        ("pause", None) => Input::Session(SessionCommand::Pause),
        ("n", None) => Input::Session(SessionCommand::Next),
        ("b", None) => Input::Session(SessionCommand::Prev),
        ("stop", None) => Input::Session(SessionCommand::Stop),
        ("refresh", None) => Input::Session(SessionCommand::RefreshPlaylist),
        ("s", Some(secs)) => {
            let secs: f64 = secs
                .parse()
                .map_err(|_| format!("not a number of seconds: {secs}"))?;
            Input::Session(SessionCommand::Seek((secs * 1000.0).round() as i64))
        }
        ("sel", Some(n)) => match n.parse::<usize>() {
            Ok(n) if n >= 1 => Input::Select(n - 1),
            _ => return Err(format!("not a track number: {n}")),
        },
        ("focus", Some(kind)) => {
            let change = match kind {
                "gain" => FocusChange::Gained,
                "loss" => FocusChange::Lost,
                "transient" => FocusChange::LostTransient,
                "duck" => FocusChange::LostTransientCanDuck,
                other => return Err(format!("unknown focus change: {other}")),
            };
            Input::Session(SessionCommand::Focus(change))
        }
        ("r", None) => Input::ToggleRepeat,
        ("ls", None) => Input::ListTracks,
        ("st" | "status", None) => Input::Status,
        ("h" | "help" | "?", None) => Input::Help,
        ("q" | "quit", None) => Input::Quit,
        ("s" | "sel" | "focus", None) => return Err(format!("`{command}` needs an argument")),
        _ => return Err(format!("unknown command: {}", line.trim())),
    };

    if words.next().is_some() {
        return Err(format!("too many arguments: {}", line.trim()));
    }
    Ok(input)
}
