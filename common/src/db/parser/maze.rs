use crate::db::core::{Grid, GridError, TerminalKind};
use crate::db::indices::NetId;
use crate::geom::coord::GridCoord;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read maze file: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing grid {0}")]
    MissingDimension(&'static str),
    #[error("invalid grid {what} '{token}'")]
    BadDimension { what: &'static str, token: String },
    #[error("expected {expected} cell tokens, found {found}")]
    TooFewTokens { expected: usize, found: usize },
    #[error("invalid token '{token}' at {coord}")]
    InvalidToken { token: String, coord: GridCoord },
    #[error(transparent)]
    Grid(#[from] GridError),
}

pub fn parse(filename: impl AsRef<Path>) -> Result<Grid, ParseError> {
    let text = std::fs::read_to_string(filename)?;
    parse_str(&text)
}

/// Parses `M N` followed by `M*N` row-major tokens: `#`, `.`, `S<id>`, `E<id>`.
pub fn parse_str(text: &str) -> Result<Grid, ParseError> {
    let mut tokens = text.split_whitespace();

    let rows = parse_dimension(tokens.next(), "rows")?;
    let cols = parse_dimension(tokens.next(), "cols")?;
    let mut grid = Grid::new(rows, cols)?;

    let expected = (rows as usize) * (cols as usize);
    for idx in 0..expected {
        let coord = grid.coord(idx);
        let token = tokens.next().ok_or(ParseError::TooFewTokens {
            expected,
            found: idx,
        })?;

        match token {
            "#" => grid.set_obstacle(coord)?,
            "." => {}
            _ => {
                let (kind, net) = parse_terminal(token).ok_or_else(|| {
                    ParseError::InvalidToken {
                        token: token.to_string(),
                        coord,
                    }
                })?;
                grid.add_terminal(net, coord, kind)?;
            }
        }
    }

    let trailing = tokens.count();
    if trailing > 0 {
        log::warn!("Ignoring {} trailing tokens after the grid", trailing);
    }

    grid.validate_nets()?;
    log::debug!(
        "Loaded {}x{} maze with {} nets",
        rows,
        cols,
        grid.num_nets()
    );
    Ok(grid)
}

fn parse_dimension(token: Option<&str>, what: &'static str) -> Result<u32, ParseError> {
    let token = token.ok_or(ParseError::MissingDimension(what))?;
    match token.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ParseError::BadDimension {
            what,
            token: token.to_string(),
        }),
    }
}

fn parse_terminal(token: &str) -> Option<(TerminalKind, NetId)> {
    let kind = match token.as_bytes().first()? {
        b'S' => TerminalKind::Start,
        b'E' => TerminalKind::End,
        _ => return None,
    };
    let digits = &token[1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().map(|id| (kind, NetId::new(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_terminals_and_obstacles() {
        let grid = parse_str("2 3\nS1 # E1\n. S12 E12\n").unwrap();
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cols(), 3);
        assert!(grid.is_obstacle(GridCoord::new(0, 1)));

        let pins = grid.net_pins(NetId::new(12)).unwrap();
        assert_eq!(pins.start, GridCoord::new(1, 1));
        assert_eq!(pins.end, GridCoord::new(1, 2));
        assert_eq!(grid.num_nets(), 2);
    }

    #[test]
    fn missing_end_is_fatal() {
        let err = parse_str("1 3\nS1 . .").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Grid(GridError::MissingTerminal(_, TerminalKind::End))
        ));
    }

    #[test]
    fn unknown_token_is_fatal() {
        let err = parse_str("1 2\nS1 X1").unwrap_err();
        assert!(matches!(err, ParseError::InvalidToken { .. }));
        assert!(matches!(
            parse_str("1 2\nS E1").unwrap_err(),
            ParseError::InvalidToken { .. }
        ));
    }

    #[test]
    fn short_input_is_fatal() {
        assert!(matches!(
            parse_str("2 2\n. ."),
            Err(ParseError::TooFewTokens {
                expected: 4,
                found: 2
            })
        ));
        assert!(matches!(
            parse_str("0 2"),
            Err(ParseError::BadDimension { what: "rows", .. })
        ));
        assert!(matches!(
            parse_str(""),
            Err(ParseError::MissingDimension("rows"))
        ));
    }

    #[test]
    fn duplicate_start_is_fatal() {
        let err = parse_str("1 3\nS1 S1 E1").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Grid(GridError::DuplicateTerminal { .. })
        ));
    }
}
